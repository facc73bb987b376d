use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use crate::app::{App, Screen};
use crate::tui::AppEvent;

/// Lines moved by PageUp/PageDown.
const PAGE: u16 = 10;
/// Lines moved per mouse wheel notch.
const WHEEL: u16 = 3;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Frame => app.tick_frame(),
        AppEvent::Telemetry => app.telemetry.tick(),
        AppEvent::Fragment { id, text } => app.on_fragment(id, &text),
        AppEvent::Settled { id, outcome } => app.on_settled(id, outcome),
        AppEvent::PipelineStage { run, index } => app.on_pipeline_stage(run, index),
        AppEvent::TrainingUploaded { run } => app.on_training_uploaded(run),
        AppEvent::TrainingEpoch { run } => app.on_training_epoch(run),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work on every screen
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }
    match key.code {
        KeyCode::Tab => {
            app.screen = app.screen.next();
            return;
        }
        KeyCode::BackTab => {
            app.screen = app.screen.prev();
            return;
        }
        _ => {}
    }

    match app.screen {
        Screen::Chat => handle_chat(app, key),
        Screen::Pipeline => handle_pipeline(app, key),
        Screen::Training => handle_training(app, key),
    }
}

fn handle_chat(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if key.code == KeyCode::Char('p') {
            app.cycle_provider();
        }
        return;
    }

    if key.code == KeyCode::Enter {
        app.submit_chat();
        return;
    }

    let panel = &mut app.panel;
    match key.code {
        KeyCode::Backspace => panel.backspace(),
        KeyCode::Delete => panel.delete(),
        KeyCode::Left => panel.cursor_left(),
        KeyCode::Right => panel.cursor_right(),
        KeyCode::Home => panel.cursor_home(),
        KeyCode::End => {
            panel.cursor_end();
            panel.scroll_to_tail();
        }
        KeyCode::PageUp => panel.scroll_up(PAGE),
        KeyCode::PageDown => panel.scroll_down(PAGE),
        KeyCode::Char(c) => panel.insert_char(c),
        _ => {}
    }
}

fn handle_pipeline(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('r') => app.run_pipeline(),
        KeyCode::Char('x') => app.reset_pipeline(),
        _ => {}
    }
}

fn handle_training(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('u') => app.upload_dataset(),
        KeyCode::Char('s') => app.start_training(),
        KeyCode::Char('x') => app.reset_training(),
        KeyCode::Char('d') => {
            app.training.download();
        }
        KeyCode::Char('m') => app.training.cycle_model(),
        KeyCode::Char('e') => app.training.adjust_epochs(true),
        KeyCode::Char('E') => app.training.adjust_epochs(false),
        KeyCode::Char('b') => app.training.adjust_batch(true),
        KeyCode::Char('B') => app.training.adjust_batch(false),
        KeyCode::Char('l') => app.training.cycle_learning_rate(),
        KeyCode::Char('t') => app.training.toggle_tab(),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    if app.screen != Screen::Chat {
        return;
    }
    match mouse.kind {
        MouseEventKind::ScrollUp => app.panel.scroll_up(WHEEL),
        MouseEventKind::ScrollDown => app.panel.scroll_down(WHEEL),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::config::Config;
    use crate::message::MessageStatus;
    use crate::panel::{CLEAR_BANNER, RESPONSE_FAILED};
    use crate::pipeline::StageStatus;
    use crate::profile::Profile;
    use crate::source::{
        FragmentSink, GeminiBackend, Provider, RemoteSource, ResponseSource, RetryPolicy, SourceError,
        SERVICE_UNAVAILABLE,
    };

    enum Behavior {
        Stream(Vec<&'static str>),
        Fail,
        Panic,
    }

    struct FakeSource {
        calls: Arc<AtomicUsize>,
        behavior: Behavior,
    }

    #[async_trait]
    impl ResponseSource for FakeSource {
        fn label(&self) -> String {
            "Fake: test".to_string()
        }

        async fn produce(&self, _prompt: &str, sink: &mut dyn FragmentSink) -> Result<(), SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Stream(parts) => {
                    for part in parts {
                        sink.append(part);
                    }
                    Ok(())
                }
                Behavior::Fail => {
                    sink.append("half an ans");
                    Err(SourceError::Service { status: 503, body: "overloaded".to_string() })
                }
                Behavior::Panic => panic!("source blew up"),
            }
        }
    }

    fn app_with(
        source: Arc<dyn ResponseSource>,
    ) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = App::with_source(
            source,
            Provider::Local,
            Arc::new(Profile::default()),
            Config::new(),
            tx,
            42,
        );
        (app, rx)
    }

    fn fake(behavior: Behavior) -> (Arc<dyn ResponseSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FakeSource { calls: calls.clone(), behavior };
        (Arc::new(source), calls)
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_line(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, key(KeyCode::Char(c))).unwrap();
        }
        handle_event(app, key(KeyCode::Enter)).unwrap();
    }

    /// Apply events until the chat is idle again.
    async fn settle(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        while app.panel.is_busy() {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for response")
                .expect("event channel closed");
            handle_event(app, event).unwrap();
        }
    }

    #[tokio::test]
    async fn test_fragments_concatenate_into_reply() {
        let (source, calls) = fake(Behavior::Stream(vec!["Hel", "lo, ", "", "world"]));
        let (mut app, mut rx) = app_with(source);

        type_line(&mut app, "say hi");
        assert!(app.panel.is_busy());
        settle(&mut app, &mut rx).await;

        let last = app.panel.messages().last().unwrap();
        assert_eq!(last.text, "Hello, world");
        assert_eq!(last.status, MessageStatus::Complete);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_commands_never_reach_source() {
        let (source, calls) = fake(Behavior::Stream(vec!["nope"]));
        let (mut app, mut rx) = app_with(source);

        for command in ["help", "  STATUS ", "WhoAmI", "contact"] {
            type_line(&mut app, command);
            settle(&mut app, &mut rx).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let texts: Vec<&str> = app.panel.messages().iter().map(|m| m.text.as_str()).collect();
        assert!(texts.iter().any(|t| t.starts_with("AVAILABLE COMMANDS:")));
        assert!(texts.iter().any(|t| t.contains("CORE MODEL  : Fake: test [OPTIMIZED]")));
        assert!(texts.iter().any(|t| t.starts_with("USER SESSION:")));
        assert!(texts.iter().any(|t| t.contains("ndhanvina07@gmail.com")));
    }

    #[tokio::test]
    async fn test_clear_resets_transcript() {
        let (source, _) = fake(Behavior::Stream(vec!["ok"]));
        let (mut app, mut rx) = app_with(source);

        type_line(&mut app, "first");
        settle(&mut app, &mut rx).await;
        type_line(&mut app, "clear");

        assert_eq!(app.panel.messages().len(), 1);
        assert_eq!(app.panel.messages()[0].text, CLEAR_BANNER);
        assert_eq!(app.panel.input(), "");
    }

    #[tokio::test]
    async fn test_missing_credential_yields_single_fragment() {
        let profile = Profile::default();
        let backend = GeminiBackend::new(None, None, &profile);
        let source: Arc<dyn ResponseSource> = Arc::new(RemoteSource::new(backend, RetryPolicy::default()));
        let (mut app, mut rx) = app_with(source);

        type_line(&mut app, "who are you?");
        settle(&mut app, &mut rx).await;

        assert!(!app.panel.is_busy());
        assert_eq!(app.panel.messages().last().unwrap().text, SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_failure_replaces_partial_text() {
        let (source, _) = fake(Behavior::Fail);
        let (mut app, mut rx) = app_with(source);

        type_line(&mut app, "tell me more");
        settle(&mut app, &mut rx).await;

        let last = app.panel.messages().last().unwrap();
        assert_eq!(last.text, RESPONSE_FAILED);
        assert_eq!(last.status, MessageStatus::Failed);
    }

    #[tokio::test]
    async fn test_panicking_source_still_unlocks_input() {
        let (source, _) = fake(Behavior::Panic);
        let (mut app, mut rx) = app_with(source);

        type_line(&mut app, "break it");
        settle(&mut app, &mut rx).await;

        assert_eq!(app.panel.messages().last().unwrap().text, RESPONSE_FAILED);
        type_line(&mut app, "again");
        assert!(app.panel.is_busy());
    }

    #[tokio::test]
    async fn test_typing_while_busy_is_ignored() {
        let (source, calls) = fake(Behavior::Stream(vec!["done"]));
        let (mut app, mut rx) = app_with(source);

        type_line(&mut app, "one");
        type_line(&mut app, "two");
        assert_eq!(app.panel.input(), "");
        settle(&mut app, &mut rx).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(app.panel.messages().len(), 3);
    }

    #[tokio::test]
    async fn test_provider_cycles_only_when_idle() {
        let (source, _) = fake(Behavior::Stream(vec!["x"]));
        let (mut app, mut rx) = app_with(source);
        let ctrl_p = AppEvent::Key(KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL));

        type_line(&mut app, "hold on");
        handle_event(&mut app, ctrl_p).unwrap();
        assert_eq!(app.provider, Provider::Local);
        settle(&mut app, &mut rx).await;

        let ctrl_p = AppEvent::Key(KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL));
        handle_event(&mut app, ctrl_p).unwrap();
        assert_eq!(app.provider, Provider::Gemini);
    }

    #[tokio::test]
    async fn test_screen_keys_route_to_simulations() {
        let (source, _) = fake(Behavior::Stream(vec![]));
        let (mut app, _rx) = app_with(source);

        handle_event(&mut app, key(KeyCode::Tab)).unwrap();
        assert_eq!(app.screen, Screen::Pipeline);
        handle_event(&mut app, key(KeyCode::Char('r'))).unwrap();
        assert!(app.pipeline.is_running());
        assert_eq!(app.pipeline.status(0), Some(StageStatus::Running));
        handle_event(&mut app, key(KeyCode::Char('x'))).unwrap();
        assert!(!app.pipeline.is_running());

        handle_event(&mut app, key(KeyCode::BackTab)).unwrap();
        handle_event(&mut app, key(KeyCode::BackTab)).unwrap();
        assert_eq!(app.screen, Screen::Training);
        handle_event(&mut app, key(KeyCode::Char('e'))).unwrap();
        assert_eq!(app.training.epochs(), 30);
    }

    #[tokio::test]
    async fn test_stale_pipeline_timer_after_reset() {
        let (source, _) = fake(Behavior::Stream(vec![]));
        let (mut app, _rx) = app_with(source);

        app.run_pipeline();
        let run = app.pipeline.run_id();
        app.reset_pipeline();
        handle_event(&mut app, AppEvent::PipelineStage { run, index: 0 }).unwrap();

        assert!(app.pipeline.stages().all(|(_, s)| s == StageStatus::Pending));
        assert!(app.pipeline.logs().is_empty());
    }
}
