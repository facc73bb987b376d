use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Sparkline, Wrap},
};
use crate::app::{App, Screen};
use crate::message::{MessageStatus, Role};
use crate::pipeline::{LogKind, LogLine, StageStatus, STAGES};
use crate::profile::ProjectStatus;
use crate::training::{StudioTab, TrainingStatus};

const PROMPT: &str = "root@portfolio:~$ ";
const SPINNER: [&str; 3] = ["◐", "◓", "◑"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    match app.screen {
        Screen::Chat => render_chat_screen(app, frame, body_area),
        Screen::Pipeline => render_pipeline_screen(app, frame, body_area),
        Screen::Training => render_training_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.profile().name.to_uppercase()),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::raw(" "),
    ];

    for screen in Screen::ALL {
        let style = if screen == app.screen {
            Style::default().fg(Color::Black).bg(Color::Cyan).bold()
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", screen.title()), style));
        spans.push(Span::raw(" "));
    }

    spans.push(Span::styled(
        format!(" {} ", app.source_label()),
        Style::default().fg(Color::Green),
    ));
    spans.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = Style::default().bg(Color::Blue).fg(Color::White);
    let mode_text = match app.screen {
        Screen::Chat => " CHAT ",
        Screen::Pipeline => " PIPELINE ",
        Screen::Training => " TRAINING ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let keys: &[(&str, &str)] = match app.screen {
        Screen::Chat => &[
            ("Enter", "send"),
            ("PgUp/PgDn", "scroll"),
            ("End", "follow"),
            ("^P", "provider"),
        ],
        Screen::Pipeline => &[("r", "run"), ("x", "reset"), ("q", "quit")],
        Screen::Training => &[
            ("u", "upload"),
            ("m", "model"),
            ("e/E", "epochs"),
            ("b/B", "batch"),
            ("l", "lr"),
            ("s", "start"),
            ("d", "download"),
            ("t", "view"),
            ("x", "reset"),
        ],
    };

    let mut hints = Vec::new();
    for (key, label) in keys.iter().chain(&[("Tab", "screen"), ("^C", "quit")]) {
        hints.push(Span::styled(format!(" {} ", key), key_style));
        hints.push(Span::styled(format!(" {} ", label), label_style));
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

/// Rows `text` occupies once word-wrapped to `width` columns, counted with the
/// same wrapper the paragraph renders with.
fn wrapped_height(text: &Text, width: u16) -> u16 {
    Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(width.max(1))
        .min(u16::MAX as usize) as u16
}

fn render_chat_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_column, side_area] = Layout::horizontal([
        Constraint::Percentage(70),
        Constraint::Percentage(30),
    ])
    .areas(area);

    let [chat_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_column);

    let mut lines: Vec<Line> = Vec::new();
    let panel = &app.panel;
    let caret_on = app.animation_frame != 1;

    for (index, msg) in panel.messages().iter().enumerate() {
        match msg.role {
            Role::User => {
                lines.push(Line::from(vec![
                    Span::styled(PROMPT, Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
                    Span::styled(msg.text.clone(), Style::default().fg(Color::White)),
                ]));
            }
            Role::System => {
                let color = match msg.status {
                    MessageStatus::Failed => Color::Red,
                    _ => Color::Cyan,
                };
                let text = panel.display_text(index);
                let typing = panel.reveal_index() == Some(index) && panel.is_animating();

                if msg.is_streaming() && text.is_empty() {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("  Processing{}", dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    let rows: Vec<&str> = text.split('\n').collect();
                    let last = rows.len() - 1;
                    for (i, row) in rows.into_iter().enumerate() {
                        let mut spans = vec![Span::styled(format!("  {}", row), Style::default().fg(color))];
                        if typing && i == last && caret_on {
                            spans.push(Span::styled("▋", Style::default().fg(Color::Green)));
                        }
                        lines.push(Line::from(spans));
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(format!(" Neural Interface · {} ", app.provider.display_name()));

    // Scroll bookkeeping: follow the tail unless the user scrolled away.
    let text = Text::from(lines);
    let inner_height = chat_area.height.saturating_sub(2);
    let total = wrapped_height(&text, chat_area.width.saturating_sub(2));
    let max_scroll = total.saturating_sub(inner_height);
    if app.panel.follow_tail {
        app.panel.scroll = max_scroll;
    } else {
        app.panel.scroll = app.panel.scroll.min(max_scroll);
        if app.panel.scroll == max_scroll {
            app.panel.scroll_to_tail();
        }
    }

    let chat = Paragraph::new(text)
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.panel.scroll, 0));
    frame.render_widget(chat, chat_area);

    render_chat_input(app, frame, input_area);
    render_side_pane(app, frame, side_area);
}

fn render_chat_input(app: &App, frame: &mut Frame, area: Rect) {
    let busy = app.panel.is_busy();
    let border_color = if busy { Color::DarkGray } else { Color::Yellow };
    let title = if busy { " [PROCESSING] " } else { " Command " };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Inner width = total width - 2 (for borders) - prompt
    let prompt_width = PROMPT.chars().count();
    let inner_width = (area.width.saturating_sub(2) as usize).saturating_sub(prompt_width);
    let cursor_pos = app.panel.cursor();

    // Calculate scroll offset to keep cursor visible
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.panel
        .input()
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(Line::from(vec![
        Span::styled(PROMPT, Style::default().fg(Color::Green).bold()),
        Span::styled(visible_text, Style::default().fg(Color::White)),
    ]))
    .block(input_block);
    frame.render_widget(input, area);

    if !busy {
        let cursor_x = (prompt_width + cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_side_pane(app: &App, frame: &mut Frame, area: Rect) {
    let profile = app.profile();
    let projects_height = (profile.projects.len() as u16).saturating_add(2).min(8);
    let [about_area, projects_area, telemetry_area] = Layout::vertical([
        Constraint::Length(9),
        Constraint::Length(projects_height),
        Constraint::Min(0),
    ])
    .areas(area);

    let mut about = vec![
        Line::from(Span::styled(profile.name.clone(), Style::default().fg(Color::Cyan).bold())),
        Line::from(Span::styled(profile.headline.clone(), Style::default().fg(Color::Gray))),
    ];
    if let Some(job) = profile.current_job() {
        about.push(Line::from(format!("{} @ {}", job.role, job.company)));
        if !job.stack.is_empty() {
            about.push(Line::from(Span::styled(job.stack.join(" · "), Style::default().fg(Color::DarkGray))));
        }
    }
    about.push(Line::from(Span::styled(profile.social.email.clone(), Style::default().fg(Color::DarkGray))));
    about.push(Line::from(Span::styled(
        format!("session GUEST_{:04}", app.panel.guest_id()),
        Style::default().fg(Color::DarkGray),
    )));

    let about_widget = Paragraph::new(about)
        .block(Block::default().borders(Borders::ALL).title(" Operator "))
        .wrap(Wrap { trim: true });
    frame.render_widget(about_widget, about_area);

    let projects: Vec<ListItem> = profile
        .projects
        .iter()
        .map(|proj| {
            let color = match proj.status {
                ProjectStatus::Live => Color::Green,
                ProjectStatus::Dev => Color::Yellow,
                ProjectStatus::Archived => Color::DarkGray,
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", proj.id), Style::default().fg(Color::DarkGray)),
                Span::styled(proj.title.clone(), Style::default().fg(color)),
            ]))
        })
        .collect();
    let projects_widget = List::new(projects).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Deployed Systems "),
    );
    frame.render_widget(projects_widget, projects_area);

    let inner_height = telemetry_area.height.saturating_sub(2) as usize;
    let mut lines: Vec<Line> = app
        .telemetry
        .lines()
        .map(|l| {
            Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::DarkGray)),
                Span::styled(l.to_string(), Style::default().fg(Color::Gray)),
            ])
        })
        .collect();
    lines.push(Line::from(Span::styled("> _", Style::default().fg(Color::DarkGray))));
    let skip = lines.len().saturating_sub(inner_height);

    let telemetry = Paragraph::new(lines.into_iter().skip(skip).collect::<Vec<_>>())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(" System Log "),
        );
    frame.render_widget(telemetry, telemetry_area);
}

fn log_line(line: &LogLine) -> Line<'static> {
    let color = match line.kind {
        LogKind::Info => Color::Gray,
        LogKind::Command => Color::Yellow,
        LogKind::Success => Color::Green,
        LogKind::Error => Color::Red,
    };
    Line::from(Span::styled(line.render(), Style::default().fg(color)))
}

/// Log pane pinned to its newest lines.
fn render_logs(logs: &[LogLine], placeholder: &str, title: &str, frame: &mut Frame, area: Rect) {
    let lines: Vec<Line> = if logs.is_empty() {
        vec![Line::from(Span::styled(
            placeholder.to_string(),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))]
    } else {
        logs.iter().map(log_line).collect()
    };

    let text = Text::from(lines);
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_height(&text, area.width.saturating_sub(2));
    let scroll = total.saturating_sub(inner_height);

    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(widget, area);
}

fn render_pipeline_screen(app: &App, frame: &mut Frame, area: Rect) {
    let [stages_area, right_area] = Layout::horizontal([
        Constraint::Percentage(35),
        Constraint::Percentage(65),
    ])
    .areas(area);

    let spinner = SPINNER[app.animation_frame as usize % SPINNER.len()];
    let items: Vec<ListItem> = app
        .pipeline
        .stages()
        .map(|(spec, status)| {
            let (icon, style) = match status {
                StageStatus::Pending => ("○", Style::default().fg(Color::DarkGray)),
                StageStatus::Running => (spinner, Style::default().fg(Color::Yellow).bold()),
                StageStatus::Completed => ("✓", Style::default().fg(Color::Green)),
                StageStatus::Failed => ("✗", Style::default().fg(Color::Red)),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!(" {} ", icon), style),
                Span::styled(spec.label, style),
            ]))
        })
        .collect();

    let title = match app.pipeline.active() {
        Some(index) => format!(" Stages [{}/{}] ", index + 1, STAGES.len()),
        None => " Stages ".to_string(),
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, stages_area);

    let [gauge_area, logs_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(right_area);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(app.pipeline.progress());
    frame.render_widget(gauge, gauge_area);

    render_logs(app.pipeline.logs(), "Ready for trigger.", " Orchestrator Log ", frame, logs_area);
}

fn render_training_screen(app: &App, frame: &mut Frame, area: Rect) {
    let studio = &app.training;
    let [config_area, right_area] = Layout::horizontal([
        Constraint::Percentage(35),
        Constraint::Percentage(65),
    ])
    .areas(area);

    let status = match studio.status() {
        TrainingStatus::Idle => ("IDLE", Color::DarkGray),
        TrainingStatus::Uploading => ("UPLOADING", Color::Yellow),
        TrainingStatus::Ready => ("READY", Color::Cyan),
        TrainingStatus::Training => ("TRAINING", Color::Yellow),
        TrainingStatus::Completed => ("COMPLETED", Color::Green),
    };
    let label = Style::default().fg(Color::DarkGray);
    let model = studio.model();
    let config_lines = vec![
        Line::from(vec![Span::styled("Status   ", label), Span::styled(status.0, Style::default().fg(status.1).bold())]),
        Line::default(),
        Line::from(vec![Span::styled("Dataset  ", label), Span::raw(studio.dataset().unwrap_or("none"))]),
        Line::from(vec![Span::styled("Model    ", label), Span::raw(model.name)]),
        Line::from(vec![Span::styled("Task     ", label), Span::raw(model.task)]),
        Line::default(),
        Line::from(vec![Span::styled("Epochs   ", label), Span::raw(studio.epochs().to_string())]),
        Line::from(vec![Span::styled("Batch    ", label), Span::raw(studio.batch_size().to_string())]),
        Line::from(vec![Span::styled("LR       ", label), Span::raw(studio.learning_rate().to_string())]),
    ];
    let config = Paragraph::new(config_lines)
        .block(Block::default().borders(Borders::ALL).title(" Configuration "));
    frame.render_widget(config, config_area);

    let [gauge_area, view_area, logs_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Percentage(50),
        Constraint::Min(0),
    ])
    .areas(right_area);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Epochs "))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(studio.progress());
    frame.render_widget(gauge, gauge_area);

    match studio.tab {
        StudioTab::Metrics => render_metrics(app, frame, view_area),
        StudioTab::Architecture => render_architecture(app, frame, view_area),
    }

    render_logs(studio.logs(), "Awaiting dataset upload.", " Training Log ", frame, logs_area);
}

fn render_metrics(app: &App, frame: &mut Frame, area: Rect) {
    let metrics = app.training.metrics();
    let [loss_area, acc_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(area);

    let loss: Vec<u64> = metrics.iter().map(|m| (m.loss * 1000.0) as u64).collect();
    let acc: Vec<u64> = metrics.iter().map(|m| (m.accuracy * 1000.0) as u64).collect();
    let last = metrics.last();

    let loss_title = match last {
        Some(m) => format!(" Loss {:.4} ", m.loss),
        None => " Loss ".to_string(),
    };
    let acc_title = match last {
        Some(m) => format!(" Accuracy {:.2}% ", m.accuracy * 100.0),
        None => " Accuracy ".to_string(),
    };

    frame.render_widget(
        Sparkline::default()
            .block(Block::default().borders(Borders::ALL).title(loss_title))
            .data(&loss)
            .style(Style::default().fg(Color::Red)),
        loss_area,
    );
    frame.render_widget(
        Sparkline::default()
            .block(Block::default().borders(Borders::ALL).title(acc_title))
            .data(&acc)
            .max(1000)
            .style(Style::default().fg(Color::Green)),
        acc_area,
    );
}

fn render_architecture(app: &App, frame: &mut Frame, area: Rect) {
    let model = app.training.model();
    let mut spans = Vec::new();
    for (i, layer) in model.layers.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(format!("[{}]", layer), Style::default().fg(Color::Cyan).bold()));
    }

    let lines = vec![
        Line::from(Span::styled(model.name, Style::default().fg(Color::White).bold())),
        Line::default(),
        Line::from(spans),
    ];
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Architecture "))
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use ratatui::{backend::TestBackend, Terminal};
    use tokio::sync::mpsc;

    use crate::config::Config;
    use crate::panel::Submission;
    use crate::profile::Profile;
    use crate::source::{LocalSource, LocalTiming, Provider};

    fn test_app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        let profile = Arc::new(Profile::default());
        let source = Arc::new(LocalSource::new(profile.clone(), LocalTiming::default()));
        let mut app = App::with_source(source, Provider::Local, profile, Config::new(), tx, 42);
        app.panel.typewriter = false;
        app
    }

    fn settle_reply(app: &mut App, reply: &str) {
        app.panel.set_input("tell me everything");
        let Submission::Remote { id, .. } = app.panel.submit(&Profile::default(), "Local") else {
            panic!("expected remote submission");
        };
        assert!(app.panel.append(id, reply));
        assert!(app.panel.settle(id, Ok(())));
    }

    fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_wrapped_height_counts_word_wrapped_rows() {
        // 14 characters fit in two 7-column rows, but whole words need three.
        assert_eq!(wrapped_height(&Text::from("aaaa bbbb cccc"), 7), 3);
        assert_eq!(wrapped_height(&Text::from(vec![Line::from("ab"), Line::default()]), 7), 2);
    }

    #[test]
    fn test_follow_tail_shows_end_of_long_reply() {
        let mut app = test_app();
        let words: Vec<String> = (0..30).map(|i| format!("{:a>23}", i)).collect();
        let reply = format!("{} ZZEND", words.join(" "));
        settle_reply(&mut app, &reply);

        let screen = draw(&mut app, 60, 14);
        assert!(screen.contains("ZZEND"));
        assert!(app.panel.follow_tail);
    }

    #[test]
    fn test_scrolled_away_view_stays_put() {
        let mut app = test_app();
        let words: Vec<String> = (0..30).map(|i| format!("{:b>23}", i)).collect();
        settle_reply(&mut app, &format!("{} ZZEND", words.join(" ")));
        draw(&mut app, 60, 14);

        app.panel.scroll_up(u16::MAX);
        let screen = draw(&mut app, 60, 14);
        assert_eq!(app.panel.scroll, 0);
        assert!(!app.panel.follow_tail);
        assert!(screen.contains("System initialized"));
        assert!(!screen.contains("ZZEND"));
    }

    #[test]
    fn test_side_pane_lists_projects_and_stack() {
        let mut app = test_app();
        let screen = draw(&mut app, 200, 40);
        assert!(screen.contains("SYS_001 CtrlFake"));
        assert!(screen.contains("Deployed Systems"));
        assert!(screen.contains("PyTorch · MLflow"));
    }
}
