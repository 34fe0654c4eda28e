//! Dialogue signal tracking: escalation and repetition.
//!
//! Watches the user side of the conversation and decides, before any remote
//! call, whether the next reply should come from a canned source instead:
//!
//! 1. **Escalation** — emotionally charged turns feed a counter; at the
//!    threshold the session pauses with a summarising question.
//! 2. **Loop** — near-identical recent turns, or an explicit complaint
//!    about repetition, trigger a refocusing question.
//!
//! Escalation is evaluated first; when both would fire on the same turn
//! only the escalation signal is reported. Both checks are cheap text
//! scans, no model involved.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many of the newest user texts the loop detector keeps.
pub const RECENT_USER_WINDOW: usize = 4;

const DEFAULT_ESCALATION_THRESHOLD: u32 = 3;
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;

// ── Vocabulary tables ───────────────────────────────────────────────────

/// Emotionally charged markers that feed the escalation counter.
const CHARGED_TERMS: &[&str] = &[
    "死にたい",
    "消えたい",
    "もう無理",
    "もうだめ",
    "もうダメ",
    "限界",
    "つらい",
    "辛い",
    "苦しい",
    "耐えられない",
    "許せない",
    "最悪",
];

/// Phrases that read as a complaint about the conversation itself.
const META_PHRASES: &[&str] = &[
    "さっきと同じ",
    "同じ質問",
    "同じこと聞",
    "また同じ",
    "話が進まない",
    "堂々巡り",
    "繰り返し",
];

// ── Rules and signals ───────────────────────────────────────────────────

/// Tunable governor rule set. The defaults carry the built-in vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorRules {
    /// Charged turns needed before the escalation signal fires.
    pub escalation_threshold: u32,
    /// Positional similarity above which two turns count as repeats.
    pub similarity_threshold: f32,
    /// Substrings that mark a user turn as emotionally charged.
    pub charged_terms: Vec<String>,
    /// Substrings that mark a user turn as a repetition complaint.
    pub meta_phrases: Vec<String>,
}

impl Default for GovernorRules {
    fn default() -> Self {
        Self {
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            charged_terms: CHARGED_TERMS.iter().map(|s| (*s).to_owned()).collect(),
            meta_phrases: META_PHRASES.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Decision to answer from a canned source instead of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortCircuit {
    /// Sustained escalation: pause and name what is weighing most.
    EscalationSummary,
    /// The conversation is circling: refocus on what is still unsaid.
    LoopRefocus,
}

/// Per-session signal state.
#[derive(Debug, Clone)]
pub struct SignalTracker {
    rules: GovernorRules,
    escalation_count: u32,
    recent_user_texts: VecDeque<String>,
}

impl Default for SignalTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(GovernorRules::default())
    }

    #[must_use]
    pub fn with_rules(rules: GovernorRules) -> Self {
        Self {
            rules,
            escalation_count: 0,
            recent_user_texts: VecDeque::with_capacity(RECENT_USER_WINDOW),
        }
    }

    /// Record the newest user text and decide whether to short-circuit.
    ///
    /// A charged turn increments the escalation counter; an uncharged turn
    /// leaves it untouched. Firing resets the counter to zero.
    pub fn observe_user_turn(&mut self, text: &str) -> Option<ShortCircuit> {
        self.remember(text);

        if self.is_charged(text) {
            self.escalation_count += 1;
            if self.escalation_count >= self.rules.escalation_threshold {
                self.escalation_count = 0;
                return Some(ShortCircuit::EscalationSummary);
            }
        }

        if self.loop_detected(text) {
            return Some(ShortCircuit::LoopRefocus);
        }
        None
    }

    /// Charged turns recorded since the last firing or reset.
    #[must_use]
    pub fn escalation_count(&self) -> u32 {
        self.escalation_count
    }

    /// Forget everything. Called on session reset.
    pub fn reset(&mut self) {
        self.escalation_count = 0;
        self.recent_user_texts.clear();
    }

    fn remember(&mut self, text: &str) {
        self.recent_user_texts.push_back(text.to_owned());
        while self.recent_user_texts.len() > RECENT_USER_WINDOW {
            self.recent_user_texts.pop_front();
        }
    }

    fn is_charged(&self, text: &str) -> bool {
        self.rules
            .charged_terms
            .iter()
            .any(|term| text.contains(term.as_str()))
    }

    /// Loop check over the full window `[a, b, c, d]` (d newest): the two
    /// most recent consecutive pairs are compared, and the newest text is
    /// scanned for repetition complaints. Needs a full window.
    fn loop_detected(&self, newest: &str) -> bool {
        if self.recent_user_texts.len() < RECENT_USER_WINDOW {
            return false;
        }
        if self
            .rules
            .meta_phrases
            .iter()
            .any(|phrase| newest.contains(phrase.as_str()))
        {
            return true;
        }
        let texts: Vec<&String> = self.recent_user_texts.iter().collect();
        let n = texts.len();
        positional_similarity(texts[n - 2], texts[n - 1]) > self.rules.similarity_threshold
            || positional_similarity(texts[n - 3], texts[n - 2]) > self.rules.similarity_threshold
    }
}

/// Share of matching `char`s at corresponding positions, over the shorter
/// length. Deliberately cheap: shifted-but-identical text scores low, which
/// is an accepted false negative.
#[must_use]
pub fn positional_similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let shorter = a.len().min(b.len());
    if shorter == 0 {
        return 0.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f32 / shorter as f32
}

// ── Tests ───────────────────────────────────────────────────────────────
