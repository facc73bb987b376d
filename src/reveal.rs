//! Typewriter effect for the newest system message.
//!
//! Purely cosmetic: it only tracks how many characters of a buffer are on
//! screen. The buffer itself stays the source of truth.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    target: Option<usize>,
    shown: usize,
    step: usize,
}

impl Reveal {
    pub fn new(step: usize) -> Self {
        Self {
            target: None,
            shown: 0,
            step: step.max(1),
        }
    }

    /// Advance towards the end of `text`, which belongs to message `index`.
    /// A new target starts from zero.
    pub fn tick(&mut self, index: usize, text: &str) {
        if self.target != Some(index) {
            self.target = Some(index);
            self.shown = 0;
        }
        let len = text.chars().count();
        self.shown = (self.shown + self.step).min(len);
    }

    /// Characters of message `index` currently on screen.
    pub fn visible_chars(&self, index: usize, text: &str) -> usize {
        let len = text.chars().count();
        if self.target == Some(index) {
            self.shown.min(len)
        } else {
            0
        }
    }

    /// The prefix of `text` to draw for message `index`.
    pub fn visible<'a>(&self, index: usize, text: &'a str) -> &'a str {
        let n = self.visible_chars(index, text);
        match text.char_indices().nth(n) {
            Some((byte, _)) => &text[..byte],
            None => text,
        }
    }

    /// Forget the current target, so whatever lands at any index next is
    /// typed from its first character.
    pub fn reset(&mut self) {
        self.target = None;
        self.shown = 0;
    }

    pub fn is_caught_up(&self, index: usize, text: &str) -> bool {
        self.visible_chars(index, text) >= text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reveal_is_monotonic_and_bounded() {
        let mut reveal = Reveal::new(3);
        let mut buffer = String::new();
        let mut last = 0;

        for piece in ["Acc", "essing ", "", "Project ", "Database..."] {
            buffer.push_str(piece);
            for _ in 0..2 {
                reveal.tick(5, &buffer);
                let now = reveal.visible_chars(5, &buffer);
                assert!(now >= last);
                assert!(now <= buffer.chars().count());
                last = now;
            }
        }
        for _ in 0..20 {
            reveal.tick(5, &buffer);
        }
        assert!(reveal.is_caught_up(5, &buffer));
        assert_eq!(reveal.visible(5, &buffer), buffer);
    }

    #[test]
    fn test_reveal_restarts_for_new_message() {
        let mut reveal = Reveal::new(4);
        reveal.tick(1, "first message");
        reveal.tick(1, "first message");
        assert_eq!(reveal.visible(1, "first message"), "first me");

        reveal.tick(3, "second");
        assert_eq!(reveal.visible(3, "second"), "seco");
        assert_eq!(reveal.visible_chars(1, "first message"), 0);
    }

    #[test]
    fn test_reveal_clamps_when_buffer_is_replaced() {
        let mut reveal = Reveal::new(10);
        reveal.tick(0, "a long partial answer");
        reveal.tick(0, "a long partial answer");
        assert_eq!(reveal.visible(0, "ERROR"), "ERROR");
    }

    #[test]
    fn test_reset_restarts_same_index() {
        let mut reveal = Reveal::new(3);
        for _ in 0..10 {
            reveal.tick(0, "old greeting text");
        }
        reveal.reset();
        assert_eq!(reveal.visible(0, "new banner"), "");
        reveal.tick(0, "new banner");
        assert_eq!(reveal.visible(0, "new banner"), "new");
    }

    #[test]
    fn test_reveal_multibyte_prefix() {
        let mut reveal = Reveal::new(2);
        reveal.tick(0, "✓✓✓");
        assert_eq!(reveal.visible(0, "✓✓✓"), "✓✓");
    }
}
