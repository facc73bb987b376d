//! The terminal panel: transcript, input line and the single in-flight
//! response.
//!
//! The panel is idle or awaiting a response. It never talks to a response
//! source itself. [`TerminalPanel::submit`] tells the caller what to start,
//! and the caller feeds fragments back through [`TerminalPanel::append`] and
//! finishes with [`TerminalPanel::settle`].

use tracing::{debug, warn};

use crate::commands::{Command, CommandContext};
use crate::message::{Message, MessageStatus, Role};
use crate::profile::Profile;
use crate::reveal::Reveal;

pub const GREETING: &str =
    "System initialized. Neural Interface v4.0 ready.\nExecute \"help\" for available commands or query system parameters directly.";
pub const CLEAR_BANNER: &str = "Terminal history cleared.\nSystem Interface v4.0 ready.";
pub const RESPONSE_FAILED: &str = "ERROR: Connection to Neural Core failed. Check API configuration.";

/// Identifies one response operation.
pub type ResponseId = u64;

/// What the caller has to do after a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank input or a response is still running. Nothing changed.
    Ignored,
    /// The transcript was reset.
    Cleared,
    /// Deliver `reply` for `id` locally.
    Local { id: ResponseId, reply: String },
    /// Ask the response source for `prompt`.
    Remote { id: ResponseId, prompt: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    id: ResponseId,
    index: usize,
}

pub struct TerminalPanel {
    messages: Vec<Message>,
    input: String,
    cursor: usize, // char index into input
    in_flight: Option<InFlight>,
    next_id: ResponseId,
    guest_id: u16,

    pub scroll: u16,
    pub follow_tail: bool,
    pub reveal: Reveal,
    pub typewriter: bool,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TerminalPanel {
    pub fn new(guest_id: u16, typewriter: bool) -> Self {
        Self {
            messages: vec![Message::system(GREETING)],
            input: String::new(),
            cursor: 0,
            in_flight: None,
            next_id: 1,
            guest_id: guest_id % 10_000,
            scroll: 0,
            follow_tail: true,
            reveal: Reveal::new(2),
            typewriter,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn guest_id(&self) -> u16 {
        self.guest_id
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    // Input editing, disabled while a response is running

    pub fn insert_char(&mut self, c: char) {
        if self.is_busy() {
            return;
        }
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    #[cfg(test)]
    pub fn set_input(&mut self, text: &str) {
        if self.is_busy() {
            return;
        }
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.is_busy() || self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.remove(byte_pos);
    }

    pub fn delete(&mut self) {
        if self.is_busy() {
            return;
        }
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        if !self.is_busy() {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    pub fn cursor_right(&mut self) {
        if !self.is_busy() {
            self.cursor = (self.cursor + 1).min(self.input.chars().count());
        }
    }

    pub fn cursor_home(&mut self) {
        if !self.is_busy() {
            self.cursor = 0;
        }
    }

    pub fn cursor_end(&mut self) {
        if !self.is_busy() {
            self.cursor = self.input.chars().count();
        }
    }

    /// Take the input line and decide what happens with it.
    pub fn submit(&mut self, profile: &Profile, core_model: &str) -> Submission {
        let cmd = self.input.trim().to_string();
        if cmd.is_empty() || self.is_busy() {
            return Submission::Ignored;
        }

        let command = Command::parse(&cmd);
        if command == Some(Command::Clear) {
            self.messages = vec![Message::system(CLEAR_BANNER)];
            self.clear_input();
            self.scroll = 0;
            self.follow_tail = true;
            self.reveal.reset();
            debug!("transcript cleared");
            return Submission::Cleared;
        }

        self.messages.push(Message::user(cmd.clone()));
        self.messages.push(Message::placeholder());
        self.clear_input();
        self.follow_tail = true;

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight = Some(InFlight {
            id,
            index: self.messages.len() - 1,
        });

        let ctx = CommandContext {
            profile,
            core_model,
            guest_id: self.guest_id,
        };
        match command.and_then(|c| c.reply(&ctx)) {
            Some(reply) => Submission::Local { id, reply },
            None => Submission::Remote { id, prompt: cmd },
        }
    }

    /// Append a fragment to the in-flight message. Returns false when the
    /// fragment was dropped (empty, or for an operation that is no longer
    /// in flight).
    pub fn append(&mut self, id: ResponseId, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let Some(flight) = self.in_flight.filter(|f| f.id == id) else {
            debug!(id, "dropping fragment for stale response");
            return false;
        };
        if let Some(msg) = self.messages.get_mut(flight.index) {
            msg.text.push_str(text);
        }
        self.follow_tail = true;
        true
    }

    /// Finish the in-flight operation. A failure replaces whatever arrived
    /// with [`RESPONSE_FAILED`]; the detail only goes to the log.
    pub fn settle(&mut self, id: ResponseId, outcome: Result<(), String>) -> bool {
        let Some(flight) = self.in_flight.filter(|f| f.id == id) else {
            debug!(id, "ignoring settlement for stale response");
            return false;
        };
        self.in_flight = None;

        if let Some(msg) = self.messages.get_mut(flight.index) {
            match outcome {
                Ok(()) => msg.status = MessageStatus::Complete,
                Err(detail) => {
                    warn!(id, error = %detail, "response failed");
                    msg.text = RESPONSE_FAILED.to_string();
                    msg.status = MessageStatus::Failed;
                }
            }
        }
        self.follow_tail = true;
        true
    }

    /// Freeze the in-flight message as it stands and retire its id, so late
    /// fragments are dropped. Returns the abandoned id.
    pub fn abandon(&mut self) -> Option<ResponseId> {
        let flight = self.in_flight.take()?;
        if let Some(msg) = self.messages.get_mut(flight.index) {
            msg.status = MessageStatus::Complete;
        }
        Some(flight.id)
    }

    /// Index of the message drawn with the typewriter effect: the newest one,
    /// when it is a system message.
    pub fn reveal_index(&self) -> Option<usize> {
        let last = self.messages.len().checked_sub(1)?;
        (self.messages[last].role == Role::System).then_some(last)
    }

    /// Frame tick for the typewriter.
    pub fn tick_reveal(&mut self) {
        if let Some(index) = self.reveal_index() {
            self.reveal.tick(index, &self.messages[index].text);
        }
    }

    /// Text to draw for message `index`.
    pub fn display_text(&self, index: usize) -> &str {
        let text = &self.messages[index].text;
        if self.typewriter && self.reveal_index() == Some(index) {
            self.reveal.visible(index, text)
        } else {
            text
        }
    }

    /// True while something is still being typed or awaited.
    pub fn is_animating(&self) -> bool {
        if self.is_busy() {
            return true;
        }
        match self.reveal_index() {
            Some(index) if self.typewriter => !self.reveal.is_caught_up(index, &self.messages[index].text),
            _ => false,
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines);
        self.follow_tail = false;
    }

    pub fn scroll_to_tail(&mut self) {
        self.follow_tail = true;
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }
}
