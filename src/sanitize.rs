//! Vocabulary sanitizer for surfaced replies.
//!
//! The persona avoids counseling-register nouns even when the model slips
//! one through: each banned term is swapped for a synonym from its group's
//! allowed list. Groups are validated at construction so a replacement can
//! never reintroduce a banned term.

use crate::error::{EngineError, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One substitution group: any banned member is replaced by one allowed
/// member (chosen at random per application).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermGroup {
    pub banned: Vec<String>,
    pub allowed: Vec<String>,
}

/// The built-in substitution table.
#[must_use]
pub fn default_groups() -> Vec<TermGroup> {
    fn group(banned: &[&str], allowed: &[&str]) -> TermGroup {
        TermGroup {
            banned: banned.iter().map(|s| (*s).to_owned()).collect(),
            allowed: allowed.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
    vec![
        group(&["お悩み", "悩み"], &["考えごと", "引っかかり"]),
        group(&["トラブル", "問題"], &["出来事", "事柄"]),
        group(&["アドバイス", "助言"], &["問い", "視点"]),
        group(&["カウンセリング", "セラピー"], &["対話"]),
    ]
}

/// Applies the substitution groups to reply text.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    groups: Vec<TermGroup>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        // The built-in table is proven valid by test, not at runtime.
        Self::from_groups_unchecked(default_groups())
    }
}

impl Sanitizer {
    /// Build a sanitizer, rejecting groups that could misbehave: every
    /// group needs at least one replacement, banned terms must be
    /// non-empty, and no replacement may contain a banned term from any
    /// group.
    pub fn new(groups: Vec<TermGroup>) -> Result<Self> {
        for group in &groups {
            if group.allowed.is_empty() {
                return Err(EngineError::Config(format!(
                    "term group {:?} has no allowed replacements",
                    group.banned
                )));
            }
            if group.banned.iter().any(|term| term.is_empty()) {
                return Err(EngineError::Config(
                    "term group contains an empty banned term".to_owned(),
                ));
            }
        }
        for group in &groups {
            for replacement in &group.allowed {
                if let Some(banned) = groups
                    .iter()
                    .flat_map(|g| g.banned.iter())
                    .find(|banned| replacement.contains(banned.as_str()))
                {
                    return Err(EngineError::Config(format!(
                        "replacement {replacement:?} contains banned term {banned:?}"
                    )));
                }
            }
        }
        Ok(Self::from_groups_unchecked(groups))
    }

    fn from_groups_unchecked(mut groups: Vec<TermGroup>) -> Self {
        // Longest banned term first, so "お悩み" is consumed before "悩み"
        // can leave a stray prefix behind.
        for group in &mut groups {
            group
                .banned
                .sort_by_key(|term| std::cmp::Reverse(term.len()));
        }
        Self { groups }
    }

    /// Replace every banned term. Each group picks one replacement per
    /// application, so repeated occurrences read consistently.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        let mut rng = rand::thread_rng();
        let mut out = text.to_owned();
        for group in &self.groups {
            let Some(replacement) = group.allowed.choose(&mut rng) else {
                continue;
            };
            for banned in &group.banned {
                if out.contains(banned.as_str()) {
                    out = out.replace(banned.as_str(), replacement);
                }
            }
        }
        out
    }
}
