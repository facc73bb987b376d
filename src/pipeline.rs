//! Scripted CI/CD pipeline: eight stages run one after another, each for a
//! fixed nominal duration. Nothing real happens; the point is the log.

use std::time::Duration;
use chrono::Local;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    #[allow(dead_code)]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub label: &'static str,
    pub command: &'static str,
    pub duration: Duration,
}

const fn stage(label: &'static str, command: &'static str, ms: u64) -> StageSpec {
    StageSpec {
        label,
        command,
        duration: Duration::from_millis(ms),
    }
}

pub const STAGES: [StageSpec; 8] = [
    stage("Source Control", "git push origin main", 1500),
    stage("CI / Build", "docker build -t model-api:latest .", 2500),
    stage("Data Ingestion", "dvc pull data/raw.csv", 2000),
    stage("Data Validation", "pytest tests/test_data_schema.py", 1800),
    stage("Model Training", "python train.py --epochs=50 --batch=32", 3000),
    stage("Model Evaluation", "mlflow run . --entry-point evaluate", 2000),
    stage("Deployment", "kubectl apply -f deployment.yaml", 2500),
    stage("Live Monitoring", "health_check --endpoint /predict", 1500),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Command,
    Success,
    #[allow(dead_code)]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub kind: LogKind,
    pub text: String,
}

impl LogLine {
    pub fn new(kind: LogKind, text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            kind,
            text: text.into(),
        }
    }

    /// `[HH:MM:SS] $ text`, with the prefix matching the kind.
    pub fn render(&self) -> String {
        let prefix = match self.kind {
            LogKind::Info => "",
            LogKind::Command => "$ ",
            LogKind::Success => "✓ ",
            LogKind::Error => "✗ ",
        };
        format!("[{}] {}{}", self.timestamp, prefix, self.text)
    }
}

/// What the driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    /// Wait `duration`, then report stage `index` of run `run` as elapsed.
    Wait { run: u64, index: usize, duration: Duration },
    Finished,
    /// The event was stale or out of order and changed nothing.
    Ignored,
}

pub struct Pipeline {
    statuses: Vec<StageStatus>,
    active: Option<usize>,
    logs: Vec<LogLine>,
    run: u64,
    running: bool,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            statuses: vec![StageStatus::Pending; STAGES.len()],
            active: None,
            logs: Vec::new(),
            run: 0,
            running: false,
        }
    }

    pub fn stages(&self) -> impl Iterator<Item = (&'static StageSpec, StageStatus)> + '_ {
        STAGES.iter().zip(self.statuses.iter().copied())
    }

    #[cfg(test)]
    pub fn status(&self, index: usize) -> Option<StageStatus> {
        self.statuses.get(index).copied()
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run_id(&self) -> u64 {
        self.run
    }

    /// Share of stages completed, 0..=100.
    pub fn progress(&self) -> u16 {
        let done = self
            .statuses
            .iter()
            .filter(|s| **s == StageStatus::Completed)
            .count();
        (done * 100 / STAGES.len()) as u16
    }

    fn log(&mut self, kind: LogKind, text: impl Into<String>) {
        self.logs.push(LogLine::new(kind, text));
    }

    /// Trigger a fresh run. `None` while a run is already going.
    pub fn start(&mut self) -> Option<PipelineStep> {
        if self.running {
            return None;
        }
        self.run += 1;
        self.running = true;
        self.statuses.fill(StageStatus::Pending);
        self.logs.clear();
        self.active = None;

        self.log(LogKind::Info, "Initializing MLOps Workflow Orchestrator...");
        Some(self.begin_stage(0))
    }

    fn begin_stage(&mut self, index: usize) -> PipelineStep {
        let spec = &STAGES[index];
        self.active = Some(index);
        self.statuses[index] = StageStatus::Running;
        self.log(LogKind::Info, format!("Starting Stage: {}...", spec.label));
        self.log(LogKind::Command, spec.command);
        PipelineStep::Wait {
            run: self.run,
            index,
            duration: spec.duration,
        }
    }

    /// The timer for stage `index` of run `run` went off.
    pub fn stage_elapsed(&mut self, run: u64, index: usize) -> PipelineStep {
        if !self.running || run != self.run || self.active != Some(index) {
            return PipelineStep::Ignored;
        }

        self.statuses[index] = StageStatus::Completed;
        self.log(LogKind::Success, format!("{} completed successfully.", STAGES[index].label));

        if index + 1 < STAGES.len() {
            return self.begin_stage(index + 1);
        }

        self.active = None;
        self.running = false;
        self.log(LogKind::Info, "----------------------------------------");
        self.log(LogKind::Info, "PIPELINE EXECUTION COMPLETED: SUCCESS");
        self.log(LogKind::Info, "Model deployed to Production (v2.4.1)");
        PipelineStep::Finished
    }

    /// Back to the initial state. Any outstanding timer becomes stale.
    pub fn reset(&mut self) {
        self.run += 1;
        self.running = false;
        self.active = None;
        self.statuses.fill(StageStatus::Pending);
        self.logs.clear();
    }
}
