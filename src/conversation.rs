//! Turn history for a dialogue session.
//!
//! The log is append-only: turns only disappear through an explicit session
//! reset, which re-seeds the opening greeting. Prompt builders read a bounded
//! window via [`ConversationLog::recent`] instead of the full history.

use serde::{Deserialize, Serialize};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in the dialogue. Ordering is significant and duplicate
/// texts are meaningful (the loop detector depends on them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Append-only turn history owned by a session.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// Empty log with no greeting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Log seeded with the opening assistant greeting.
    #[must_use]
    pub fn seeded(greeting: &str) -> Self {
        let mut log = Self::new();
        log.push(Turn::assistant(greeting));
        log
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Last `n` turns, oldest first. The whole log when it is shorter.
    #[must_use]
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop every turn and re-seed the opening greeting.
    pub fn reset(&mut self, greeting: &str) {
        self.turns.clear();
        self.push(Turn::assistant(greeting));
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn seeded_log_opens_with_assistant_greeting() {
        let log = ConversationLog::seeded("ようこそ");
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns()[0], Turn::assistant("ようこそ"));
    }

    #[test]
    fn recent_returns_tail_oldest_first() {
        let mut log = ConversationLog::new();
        for i in 0..5 {
            log.push(Turn::user(format!("turn {i}")));
        }
        let window = log.recent(3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].text, "turn 2");
        assert_eq!(window[2].text, "turn 4");
    }

    #[test]
    fn recent_larger_than_log_returns_everything() {
        let mut log = ConversationLog::new();
        log.push(Turn::user("a"));
        log.push(Turn::assistant("b"));
        assert_eq!(log.recent(10).len(), 2);
    }

    #[test]
    fn reset_clears_and_reseeds() {
        let mut log = ConversationLog::seeded("hello");
        log.push(Turn::user("first"));
        log.push(Turn::assistant("second"));
        log.reset("hello");
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns()[0].role, Role::Assistant);
        assert_eq!(log.turns()[0].text, "hello");
    }
}
