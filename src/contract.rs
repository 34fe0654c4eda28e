//! Output contract for machine-generated replies.
//!
//! Generated text is only surfaced after passing an ordered rule set:
//!
//! 1. non-empty
//! 2. single line (when required)
//! 3. length bounds (counted in `char`s)
//! 4. required terminator
//! 5. no forbidden vocabulary (literal terms and inflected patterns)
//!
//! Checks short-circuit on the first failure, so a reply gets exactly one
//! rejection reason. The same input against the same contract always
//! produces the same verdict.

use crate::error::{EngineError, Result};
use regex::Regex;

/// Upper bound applied by [`normalize_reply`], in `char`s.
pub const NORMALIZED_MAX_CHARS: usize = 120;

/// Persona reply length bounds, in `char`s.
pub const PERSONA_MIN_CHARS: usize = 10;
pub const PERSONA_MAX_CHARS: usize = 80;

// ── Persona vocabulary tables ───────────────────────────────────────────

/// Terminators accepted for the single-question persona. The model emits
/// the ASCII form often enough that both count.
const QUESTION_TERMINATORS: &[&str] = &["？", "?"];

/// Substrings that mark a reply as advice, comfort, cause-digging, or
/// body-sensation guidance. Any hit fails the persona contract.
const FORBIDDEN_TERMS: &[&str] = &[
    // advice / instruction
    "アドバイス",
    "助言",
    "おすすめ",
    "すべき",
    "したほうが",
    "ましょう",
    // comfort / empathy
    "大丈夫",
    "安心して",
    // cause-seeking
    "なぜ",
    "どうして",
    "原因",
    "きっかけ",
    // body-sensation guidance
    "呼吸",
    "身体",
    "力を抜",
    // feeling-digging
    "どう感じ",
];

/// Inflected forms that need more than a substring match.
const FORBIDDEN_PATTERNS: &[&str] = &[
    "て(?:ください|下さい)",
    "ですね[。、]",
    "息を(?:整え|吸|吐)",
];

// ── Verdicts ────────────────────────────────────────────────────────────

/// Why a reply failed the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Empty,
    Multiline,
    Length,
    MissingTerminator,
    ForbiddenContent,
}

impl Violation {
    /// Stable reason token, used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Multiline => "multiline",
            Self::Length => "length",
            Self::MissingTerminator => "missing-terminator",
            Self::ForbiddenContent => "forbidden-content",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of checking one candidate reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub ok: bool,
    pub reason: Option<Violation>,
}

impl Verdict {
    #[must_use]
    pub fn pass() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn fail(reason: Violation) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

// ── Contract ────────────────────────────────────────────────────────────

/// Rule set a surfaced reply must satisfy.
///
/// Every rule except the empty check can be switched off, so callers can
/// run anything from a bare "some text came back" gate up to the full
/// persona contract.
#[derive(Debug, Clone)]
pub struct ReplyContract {
    /// Minimum length in `char`s. `None` disables the lower bound.
    pub min_chars: Option<usize>,
    /// Maximum length in `char`s. `None` disables the upper bound.
    pub max_chars: Option<usize>,
    /// Reject any reply containing a line break.
    pub single_line: bool,
    /// Reply must end with one of these. Empty disables the rule.
    pub terminators: Vec<String>,
    /// Literal substrings that fail the reply.
    pub forbidden_terms: Vec<String>,
    /// Compiled patterns that fail the reply.
    pub forbidden_patterns: Vec<Regex>,
}

impl Default for ReplyContract {
    fn default() -> Self {
        Self::single_question()
    }
}

impl ReplyContract {
    /// Contract with every optional rule disabled. Only empty text fails.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            min_chars: None,
            max_chars: None,
            single_line: false,
            terminators: Vec::new(),
            forbidden_terms: Vec::new(),
            forbidden_patterns: Vec::new(),
        }
    }

    /// The persona contract: one line, 10 to 80 chars, ends in a question
    /// mark, none of the counseling-register vocabulary.
    #[must_use]
    pub fn single_question() -> Self {
        Self {
            min_chars: Some(PERSONA_MIN_CHARS),
            max_chars: Some(PERSONA_MAX_CHARS),
            single_line: true,
            terminators: QUESTION_TERMINATORS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            forbidden_terms: FORBIDDEN_TERMS.iter().map(|s| (*s).to_owned()).collect(),
            forbidden_patterns: compile_builtin(FORBIDDEN_PATTERNS),
        }
    }

    /// Check one candidate reply. Rules run in a fixed order and stop at
    /// the first failure.
    #[must_use]
    pub fn check(&self, text: &str) -> Verdict {
        if text.trim().is_empty() {
            return Verdict::fail(Violation::Empty);
        }
        if self.single_line && text.contains('\n') {
            return Verdict::fail(Violation::Multiline);
        }
        let chars = text.chars().count();
        if self.min_chars.is_some_and(|min| chars < min)
            || self.max_chars.is_some_and(|max| chars > max)
        {
            return Verdict::fail(Violation::Length);
        }
        if !self.terminators.is_empty()
            && !self.terminators.iter().any(|t| text.ends_with(t.as_str()))
        {
            return Verdict::fail(Violation::MissingTerminator);
        }
        if self
            .forbidden_terms
            .iter()
            .any(|t| text.contains(t.as_str()))
            || self.forbidden_patterns.iter().any(|p| p.is_match(text))
        {
            return Verdict::fail(Violation::ForbiddenContent);
        }
        Verdict::pass()
    }
}

/// Compile user-supplied forbidden patterns, rejecting bad ones loudly.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p)
                .map_err(|e| EngineError::Config(format!("bad forbidden pattern {p:?}: {e}")))
        })
        .collect()
}

/// Compile the built-in tables. Entries are fixed at compile time; a typo
/// shows up in the table test, not at runtime.
fn compile_builtin(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

// ── Normalization ───────────────────────────────────────────────────────

/// Normalize a raw candidate before validation: drop carriage returns,
/// collapse newline runs into single spaces, trim, strip one layer of
/// wrapping quotes, cap at [`NORMALIZED_MAX_CHARS`].
#[must_use]
pub fn normalize_reply(raw: &str) -> String {
    let mut flat = String::with_capacity(raw.len());
    let mut newline_run = false;
    for ch in raw.chars() {
        match ch {
            '\r' => {}
            '\n' => newline_run = true,
            _ => {
                if newline_run {
                    flat.push(' ');
                    newline_run = false;
                }
                flat.push(ch);
            }
        }
    }

    let trimmed = flat.trim();
    let unquoted = trimmed
        .strip_prefix('「')
        .or_else(|| trimmed.strip_prefix('"'))
        .unwrap_or(trimmed);
    let unquoted = unquoted
        .strip_suffix('」')
        .or_else(|| unquoted.strip_suffix('"'))
        .unwrap_or(unquoted);

    unquoted.trim().chars().take(NORMALIZED_MAX_CHARS).collect()
}

// ── Tests ───────────────────────────────────────────────────────────────
