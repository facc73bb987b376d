use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::panel::{ResponseId, Submission, TerminalPanel};
use crate::pipeline::{Pipeline, PipelineStep};
use crate::profile::Profile;
use crate::source::{build_source, FragmentSink, Provider, ResponseSource};
use crate::telemetry::TelemetryFeed;
use crate::training::{EpochOutcome, TrainingStudio, EPOCH_INTERVAL, UPLOAD_DELAY};
use crate::tui::{AppEvent, EventSender};

/// Pause before a built-in command answers, so it reads like the core replied.
pub const LOCAL_COMMAND_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Chat,
    Pipeline,
    Training,
}

impl Screen {
    pub const ALL: [Screen; 3] = [Screen::Chat, Screen::Pipeline, Screen::Training];

    pub fn title(&self) -> &'static str {
        match self {
            Screen::Chat => "Neural Interface",
            Screen::Pipeline => "MLOps Pipeline",
            Screen::Training => "Training Studio",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    pub fn next(&self) -> Screen {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Screen {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Posts fragments of response `id` back into the event loop.
struct ChannelSink {
    id: ResponseId,
    tx: EventSender,
}

impl FragmentSink for ChannelSink {
    fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.tx.send(AppEvent::Fragment {
            id: self.id,
            text: text.to_string(),
        });
    }
}

/// Aborts the wrapped task when dropped, so an aborted parent takes its
/// child down with it.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn replace_task(slot: &mut Option<JoinHandle<()>>, task: JoinHandle<()>) {
    if let Some(old) = slot.replace(task) {
        old.abort();
    }
}

fn cancel_task(slot: &mut Option<JoinHandle<()>>) {
    if let Some(task) = slot.take() {
        task.abort();
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,

    // Screens
    pub panel: TerminalPanel,
    pub pipeline: Pipeline,
    pub training: TrainingStudio,
    pub telemetry: TelemetryFeed,

    // Response source
    pub provider: Provider,
    source: Arc<dyn ResponseSource>,
    profile: Arc<Profile>,
    config: Config,
    persist_provider: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for spinner and cursor blink

    // Background work, all reporting through `events`
    events: EventSender,
    response_task: Option<JoinHandle<()>>,
    pipeline_timer: Option<JoinHandle<()>>,
    training_timer: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(config: Config, events: EventSender) -> Result<Self> {
        let profile = Arc::new(config.profile()?);
        let provider = config.provider();
        let source = build_source(provider, &config, profile.clone());
        info!(provider = provider.as_str(), source = %source.label(), "starting portfolio terminal");

        let mut app = Self::with_source(source, provider, profile, config, events, rand::random());
        app.persist_provider = true;
        Ok(app)
    }

    /// Build around an explicit source. Randomness is drawn from `seed`.
    pub fn with_source(
        source: Arc<dyn ResponseSource>,
        provider: Provider,
        profile: Arc<Profile>,
        config: Config,
        events: EventSender,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let guest_id = rng.gen_range(0..10_000);

        Self {
            should_quit: false,
            screen: Screen::Chat,
            panel: TerminalPanel::new(guest_id, config.typewriter()),
            pipeline: Pipeline::new(),
            training: TrainingStudio::new(rng.gen()),
            telemetry: TelemetryFeed::new(rng.gen()),
            provider,
            source,
            profile,
            config,
            persist_provider: false,
            animation_frame: 0,
            events,
            response_task: None,
            pipeline_timer: None,
            training_timer: None,
        }
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn source_label(&self) -> String {
        self.source.label()
    }

    // Chat

    pub fn submit_chat(&mut self) {
        let label = self.source.label();
        match self.panel.submit(&self.profile, &label) {
            Submission::Ignored | Submission::Cleared => {}
            Submission::Local { id, reply } => {
                debug!(id, "answering built-in command");
                let tx = self.events.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(LOCAL_COMMAND_DELAY).await;
                    let _ = tx.send(AppEvent::Fragment { id, text: reply });
                    let _ = tx.send(AppEvent::Settled { id, outcome: Ok(()) });
                });
                replace_task(&mut self.response_task, task);
            }
            Submission::Remote { id, prompt } => {
                info!(id, source = %label, "submitting prompt");
                let source = self.source.clone();
                let tx = self.events.clone();
                let task = tokio::spawn(async move {
                    let mut sink = ChannelSink { id, tx: tx.clone() };
                    let mut worker = AbortOnDrop(tokio::spawn(async move {
                        source.produce(&prompt, &mut sink).await
                    }));
                    // A panicking source still settles, so input never stays locked.
                    let outcome = match (&mut worker.0).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(e) => Err(format!("response task failed: {}", e)),
                    };
                    let _ = tx.send(AppEvent::Settled { id, outcome });
                });
                replace_task(&mut self.response_task, task);
            }
        }
    }

    pub fn on_fragment(&mut self, id: ResponseId, text: &str) {
        self.panel.append(id, text);
    }

    pub fn on_settled(&mut self, id: ResponseId, outcome: Result<(), String>) {
        if self.panel.settle(id, outcome) {
            self.response_task = None;
        }
    }

    /// Switch to the next provider. Only while idle; the choice is saved.
    pub fn cycle_provider(&mut self) {
        if self.panel.is_busy() {
            return;
        }
        self.set_provider(self.provider.next());
    }

    pub fn set_provider(&mut self, provider: Provider) {
        self.provider = provider;
        self.source = build_source(provider, &self.config, self.profile.clone());
        info!(provider = provider.as_str(), source = %self.source.label(), "switched provider");

        if self.persist_provider {
            if let Err(e) = Config::save_provider(provider) {
                warn!(error = %e, "could not persist provider choice");
            }
        }
    }

    // Pipeline

    pub fn run_pipeline(&mut self) {
        if let Some(step) = self.pipeline.start() {
            info!(run = self.pipeline.run_id(), "pipeline triggered");
            self.schedule_pipeline(step);
        }
    }

    pub fn reset_pipeline(&mut self) {
        cancel_task(&mut self.pipeline_timer);
        self.pipeline.reset();
    }

    pub fn on_pipeline_stage(&mut self, run: u64, index: usize) {
        let step = self.pipeline.stage_elapsed(run, index);
        if step == PipelineStep::Finished {
            info!(run, "pipeline finished");
            self.pipeline_timer = None;
        }
        self.schedule_pipeline(step);
    }

    fn schedule_pipeline(&mut self, step: PipelineStep) {
        let PipelineStep::Wait { run, index, duration } = step else {
            return;
        };
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(AppEvent::PipelineStage { run, index });
        });
        replace_task(&mut self.pipeline_timer, task);
    }

    // Training

    pub fn upload_dataset(&mut self) {
        let Some(run) = self.training.upload() else {
            return;
        };
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(UPLOAD_DELAY).await;
            let _ = tx.send(AppEvent::TrainingUploaded { run });
        });
        replace_task(&mut self.training_timer, task);
    }

    pub fn on_training_uploaded(&mut self, run: u64) {
        if self.training.upload_finished(run) {
            self.training_timer = None;
        }
    }

    pub fn start_training(&mut self) {
        let Some(run) = self.training.start() else {
            return;
        };
        info!(run, model = self.training.model().id, epochs = self.training.epochs(), "training started");
        let tx = self.events.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(EPOCH_INTERVAL);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(AppEvent::TrainingEpoch { run }).is_err() {
                    break;
                }
            }
        });
        replace_task(&mut self.training_timer, task);
    }

    pub fn on_training_epoch(&mut self, run: u64) {
        if self.training.epoch(run) == EpochOutcome::Finished {
            info!(run, "training finished");
            cancel_task(&mut self.training_timer);
        }
    }

    pub fn reset_training(&mut self) {
        cancel_task(&mut self.training_timer);
        self.training.reset();
    }

    // Animation

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        self.animation_frame = (self.animation_frame + 1) % 3;
    }

    /// Typewriter frame.
    pub fn tick_frame(&mut self) {
        if self.panel.typewriter {
            self.panel.tick_reveal();
        }
    }

    /// Abandon in-flight work and stop every timer.
    pub fn shutdown(&mut self) {
        if let Some(id) = self.panel.abandon() {
            debug!(id, "abandoning response on shutdown");
        }
        cancel_task(&mut self.response_task);
        cancel_task(&mut self.pipeline_timer);
        cancel_task(&mut self.training_timer);
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.shutdown();
    }
}
