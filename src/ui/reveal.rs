//! Word-by-word text reveal for the orb's response.

use std::time::Duration;

/// Default pause between revealed words.
pub const DEFAULT_WORD_DELAY: Duration = Duration::from_millis(50);

/// Reveals text one word per `word_delay`, starting from nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordReveal {
    words: Vec<String>,
    word_delay: Duration,
}

impl WordReveal {
    pub fn new(text: &str, word_delay: Duration) -> Self {
        let words = text
            .split(' ')
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .collect();
        Self { words, word_delay }
    }

    /// The first `count` words joined by single spaces.
    pub fn frame(&self, count: usize) -> String {
        self.words[..count.min(self.words.len())].join(" ")
    }

    /// Number of words visible after `elapsed`.
    pub fn visible_words(&self, elapsed: Duration) -> usize {
        if self.word_delay.is_zero() {
            return self.words.len();
        }
        let steps = elapsed.as_millis() / self.word_delay.as_millis().max(1);
        usize::try_from(steps)
            .unwrap_or(usize::MAX)
            .min(self.words.len())
    }

    /// Text visible after `elapsed`.
    pub fn text_at(&self, elapsed: Duration) -> String {
        self.frame(self.visible_words(elapsed))
    }
}
