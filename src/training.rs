//! Mock model-training studio. Metrics are pseudo-random decay curves driven
//! by a seeded generator, so a given seed always trains the same way.

use std::time::Duration;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pipeline::{LogKind, LogLine};

pub const UPLOAD_DELAY: Duration = Duration::from_millis(1500);
pub const EPOCH_INTERVAL: Duration = Duration::from_millis(500);
pub const LEARNING_RATES: [f64; 4] = [0.1, 0.01, 0.001, 0.0001];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingStatus {
    Idle,
    Uploading,
    Ready,
    Training,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioTab {
    Metrics,
    Architecture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub id: &'static str,
    pub name: &'static str,
    pub task: &'static str,
    pub layers: &'static [&'static str],
}

pub const MODELS: [ModelSpec; 4] = [
    ModelSpec {
        id: "cnn",
        name: "ConvNeuralNet (CNN)",
        task: "Image Classification",
        layers: &["Conv2D", "MaxPool", "Conv2D", "Dense"],
    },
    ModelSpec {
        id: "transformer",
        name: "Transformer (BERT)",
        task: "NLP / Text",
        layers: &["Embedding", "SelfAttn", "FeedFwd", "Norm"],
    },
    ModelSpec {
        id: "lstm",
        name: "LSTM / GRU",
        task: "Time Series",
        layers: &["Input", "LSTM Cell", "Dropout", "Dense"],
    },
    ModelSpec {
        id: "rf",
        name: "Random Forest",
        task: "Tabular Data",
        layers: &["Bootstrap", "DecisionTree", "Vote", "Output"],
    },
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: u32,
    pub loss: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochOutcome {
    Ignored,
    Continue,
    Finished,
}

pub struct TrainingStudio {
    status: TrainingStatus,
    dataset: Option<String>,
    model: usize,
    pub tab: StudioTab,
    epochs: u32,
    batch_size: u32,
    lr_index: usize,
    metrics: Vec<EpochMetrics>,
    logs: Vec<LogLine>,
    run: u64,
    rng: StdRng,
    loss: f64,
    accuracy: f64,
}

impl TrainingStudio {
    pub fn new(seed: u64) -> Self {
        Self {
            status: TrainingStatus::Idle,
            dataset: None,
            model: 0,
            tab: StudioTab::Metrics,
            epochs: 20,
            batch_size: 32,
            lr_index: 2,
            metrics: Vec::new(),
            logs: Vec::new(),
            run: 0,
            rng: StdRng::seed_from_u64(seed),
            loss: 2.5,
            accuracy: 0.15,
        }
    }

    pub fn status(&self) -> TrainingStatus {
        self.status
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    pub fn model(&self) -> &'static ModelSpec {
        &MODELS[self.model]
    }

    pub fn epochs(&self) -> u32 {
        self.epochs
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    pub fn learning_rate(&self) -> f64 {
        LEARNING_RATES[self.lr_index]
    }

    pub fn metrics(&self) -> &[EpochMetrics] {
        &self.metrics
    }

    pub fn logs(&self) -> &[LogLine] {
        &self.logs
    }

    pub fn progress(&self) -> u16 {
        if self.epochs == 0 {
            return 0;
        }
        (self.metrics.len() as u32 * 100 / self.epochs).min(100) as u16
    }

    fn log(&mut self, text: impl Into<String>) {
        self.logs.push(LogLine::new(LogKind::Info, text));
    }

    fn editable(&self) -> bool {
        self.status != TrainingStatus::Training
    }

    // Configuration

    pub fn cycle_model(&mut self) {
        if self.editable() {
            self.model = (self.model + 1) % MODELS.len();
        }
    }

    /// Step epochs by 10 within 10..=100.
    pub fn adjust_epochs(&mut self, up: bool) {
        if self.editable() {
            self.epochs = if up { (self.epochs + 10).min(100) } else { self.epochs.saturating_sub(10).max(10) };
        }
    }

    /// Step batch size by 8 within 8..=128.
    pub fn adjust_batch(&mut self, up: bool) {
        if self.editable() {
            self.batch_size = if up { (self.batch_size + 8).min(128) } else { self.batch_size.saturating_sub(8).max(8) };
        }
    }

    pub fn cycle_learning_rate(&mut self) {
        if self.editable() {
            self.lr_index = (self.lr_index + 1) % LEARNING_RATES.len();
        }
    }

    pub fn toggle_tab(&mut self) {
        self.tab = match self.tab {
            StudioTab::Metrics => StudioTab::Architecture,
            StudioTab::Architecture => StudioTab::Metrics,
        };
    }

    // Lifecycle

    /// Begin the fake upload. Returns the run to report back after
    /// [`UPLOAD_DELAY`].
    pub fn upload(&mut self) -> Option<u64> {
        if self.status != TrainingStatus::Idle {
            return None;
        }
        self.run += 1;
        self.status = TrainingStatus::Uploading;
        self.log("Initiating secure upload sequence...");
        Some(self.run)
    }

    pub fn upload_finished(&mut self, run: u64) -> bool {
        if self.status != TrainingStatus::Uploading || run != self.run {
            return false;
        }
        self.dataset = Some("dataset_v1.csv (145MB)".to_string());
        self.status = TrainingStatus::Ready;
        self.log("Dataset uploaded successfully: 145MB, 50k rows.");
        self.log("Data validation passed. Schema verified.");
        true
    }

    /// Start training. Returns the run whose epoch ticks should follow, every
    /// [`EPOCH_INTERVAL`].
    pub fn start(&mut self) -> Option<u64> {
        if !matches!(self.status, TrainingStatus::Ready | TrainingStatus::Completed) {
            return None;
        }
        self.run += 1;
        self.status = TrainingStatus::Training;
        self.tab = StudioTab::Metrics;
        self.metrics.clear();
        self.logs.clear();
        self.loss = 2.5;
        self.accuracy = 0.15;

        self.log(format!("Initializing {}...", self.model().name));
        self.log(format!(
            "Hyperparams: LR={}, Batch={}, Epochs={}",
            self.learning_rate(),
            self.batch_size,
            self.epochs
        ));
        self.log("Allocating GPU tensors...");
        Some(self.run)
    }

    pub fn epoch(&mut self, run: u64) -> EpochOutcome {
        if self.status != TrainingStatus::Training || run != self.run {
            return EpochOutcome::Ignored;
        }

        let epoch = self.metrics.len() as u32 + 1;
        let loss_change = self.rng.gen_range(0.0..0.15) + 0.05;
        let acc_change = self.rng.gen_range(0.0..0.08) + 0.02;
        self.loss = (self.loss - loss_change * (self.loss / 2.0)).max(0.1);
        self.accuracy = (self.accuracy + acc_change * (1.0 - self.accuracy)).min(0.99);

        let metrics = EpochMetrics {
            epoch,
            loss: round4(self.loss),
            accuracy: round4(self.accuracy),
        };
        self.metrics.push(metrics);

        if epoch % 5 == 0 || epoch == 1 {
            self.log(format!(
                "Epoch {}/{} - Loss: {} - Acc: {}",
                epoch, self.epochs, metrics.loss, metrics.accuracy
            ));
        }

        if epoch >= self.epochs {
            self.status = TrainingStatus::Completed;
            self.log("Training sequence completed successfully.");
            self.log("Model converged. Weights frozen.");
            return EpochOutcome::Finished;
        }
        EpochOutcome::Continue
    }

    pub fn download(&mut self) -> bool {
        if self.status != TrainingStatus::Completed {
            return false;
        }
        self.log(format!("Downloading {}_v1.h5 [240MB]...", self.model().id));
        self.log("Download complete.");
        true
    }

    pub fn reset(&mut self) {
        self.run += 1;
        self.status = TrainingStatus::Idle;
        self.dataset = None;
        self.metrics.clear();
        self.logs.clear();
        self.log("Session reset. Memory cleared.");
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
