use std::io::Write;
use std::sync::Arc;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

mod app;
mod commands;
mod config;
mod handler;
mod logging;
mod message;
mod panel;
mod pipeline;
mod profile;
mod reveal;
mod source;
mod telemetry;
mod training;
mod tui;
mod ui;

use app::App;
use commands::{Command, CommandContext};
use config::Config;
use pipeline::{Pipeline, PipelineStep};
use source::{build_source, FragmentSink, Provider, ResponseSource};
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "portfolio")]
#[command(version, about = "Terminal portfolio with a streaming Neural Interface")]
struct Cli {
    /// Response source: local, gemini or ollama
    #[arg(short, long, value_parser = parse_provider)]
    provider: Option<Provider>,
    /// Model name for the selected remote source
    #[arg(short, long)]
    model: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and stream the answer to stdout
    Ask {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Run the mock MLOps pipeline, printing its log
    Pipeline,
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    Provider::from_str(s).ok_or_else(|| format!("unknown provider '{}' (expected local, gemini or ollama)", s))
}

/// Writes fragments straight to stdout as they arrive.
struct StdoutSink;

impl FragmentSink for StdoutSink {
    fn append(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };

    match Config::log_dir() {
        Ok(dir) => {
            if let Err(e) = logging::init(&dir, &config.log_level()) {
                eprintln!("warning: file logging disabled: {:#}", e);
            }
        }
        Err(e) => eprintln!("warning: file logging disabled: {:#}", e),
    }
    if let Some(e) = load_error {
        warn!(error = %e, "unreadable config file, using defaults");
    }

    // Command-line overrides apply to this session only.
    if let Some(provider) = cli.provider {
        config.provider = Some(provider.as_str().to_string());
    }
    if let Some(model) = cli.model {
        config.set_model(config.provider(), model);
    }

    match cli.command {
        None => run_tui(config).await,
        Some(Commands::Ask { prompt }) => ask(&config, &prompt.join(" ")).await,
        Some(Commands::Pipeline) => run_pipeline().await,
    }
}

async fn run_tui(config: Config) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender())?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = event_loop(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    info!("terminal restored, exiting");
    result
}

async fn event_loop(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next().await else {
            break;
        };
        handler::handle_event(app, event)?;
    }
    Ok(())
}

async fn ask(config: &Config, prompt: &str) -> Result<()> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Ok(());
    }

    let profile = Arc::new(config.profile()?);
    let source = build_source(config.provider(), config, profile.clone());

    if let Some(command) = Command::parse(prompt) {
        let label = source.label();
        let ctx = CommandContext {
            profile: &profile,
            core_model: &label,
            guest_id: rand::random::<u16>() % 10_000,
        };
        let reply = command.reply(&ctx).unwrap_or_else(|| panel::CLEAR_BANNER.to_string());
        println!("{}", reply);
        return Ok(());
    }

    info!(source = %source.label(), "answering one-shot prompt");
    stream_answer(source.as_ref(), prompt, &mut StdoutSink).await;
    println!();
    Ok(())
}

/// A failed source ends the answer with the fixed failure notice. The error
/// detail only goes to the log.
async fn stream_answer(source: &dyn ResponseSource, prompt: &str, sink: &mut dyn FragmentSink) {
    if let Err(e) = source.produce(prompt, sink).await {
        warn!(error = %e, source = %source.label(), "one-shot prompt failed");
        sink.append("\n");
        sink.append(panel::RESPONSE_FAILED);
    }
}

async fn run_pipeline() -> Result<()> {
    let mut pipeline = Pipeline::new();
    let mut printed = 0;
    let mut step = pipeline.start();

    while let Some(PipelineStep::Wait { run, index, duration }) = step {
        for line in &pipeline.logs()[printed..] {
            println!("{}", line.render());
        }
        printed = pipeline.logs().len();

        tokio::time::sleep(duration).await;
        step = Some(pipeline.stage_elapsed(run, index));
    }

    for line in &pipeline.logs()[printed..] {
        println!("{}", line.render());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::panel::RESPONSE_FAILED;
    use crate::profile::Profile;
    use crate::source::{LocalSource, LocalTiming, SourceError};

    struct BrokenSource;

    #[async_trait]
    impl ResponseSource for BrokenSource {
        fn label(&self) -> String {
            "Broken: test".to_string()
        }

        async fn produce(&self, _prompt: &str, sink: &mut dyn FragmentSink) -> Result<(), SourceError> {
            sink.append("Accessing");
            Err(SourceError::Service { status: 401, body: "API key not valid".to_string() })
        }
    }

    #[tokio::test]
    async fn test_failed_answer_prints_notice_not_error() {
        let mut out = String::new();
        stream_answer(&BrokenSource, "projects", &mut out).await;

        assert_eq!(out, format!("Accessing\n{}", RESPONSE_FAILED));
        assert!(!out.contains("401"));
        assert!(!out.contains("API key"));
    }

    #[tokio::test]
    async fn test_successful_answer_is_passed_through() {
        let source = LocalSource::new(Arc::new(Profile::default()), LocalTiming::instant());
        let mut out = String::new();
        stream_answer(&source, "skills", &mut out).await;

        assert!(!out.is_empty());
        assert!(!out.contains(RESPONSE_FAILED));
    }
}
