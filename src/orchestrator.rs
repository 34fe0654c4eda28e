//! Reply orchestration: bounded history in, one surfaced reply out.
//!
//! Each turn runs an explicit phase machine:
//!
//! ```text
//! Request {attempt} → Inspect {attempt, candidate} → Settled(reply)
//! ```
//!
//! # Retry policy
//!
//! - A returned document is extracted, normalized, and checked against the
//!   reply contract; a failing candidate burns one attempt.
//! - Exhausting the attempt budget (default 3 calls total, strictly
//!   sequential) settles on the fixed fallback question.
//! - Overload (HTTP 503) and every other call failure settle immediately on
//!   their status notice; neither consumes further attempts.
//!
//! Generated and fallback text passes the vocabulary sanitizer before it
//! surfaces. Status notices are operator text and go out verbatim.

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::contract::{ReplyContract, Verdict, normalize_reply};
use crate::conversation::Turn;
use crate::extract::extract_reply_text;
use crate::persona::{FAILURE_NOTICE, FALLBACK_QUESTION, OVERLOADED_NOTICE, QUESTION_PREAMBLE};
use crate::provider::{CallError, GenerationBackend, GenerationOptions, GenerationRequest};
use crate::sanitize::Sanitizer;

/// Generation attempts per turn (total calls, not retries after the first).
pub const MAX_ATTEMPTS: u32 = 3;

/// Per-turn text cap applied when history is condensed for the wire.
pub const PAYLOAD_TURN_MAX_CHARS: usize = 500;

/// Chars of raw document kept in the empty-extraction log line.
const DOC_LOG_EXCERPT: usize = 200;

/// Where a surfaced reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    /// Model output that passed validation; `attempts` is how many calls it
    /// took (1-based).
    Generated { attempts: u32 },
    /// Retry budget exhausted; the fixed fallback question was surfaced.
    Fallback,
    /// The provider reported overload; the busy notice was surfaced.
    Overloaded,
    /// The provider call failed; the failure notice was surfaced.
    Failure,
    /// Governor escalation short-circuit; no model call happened.
    EscalationPause,
    /// Governor loop short-circuit; no model call happened.
    LoopRefocus,
}

/// A settled reply for one user turn. The text is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub origin: ReplyOrigin,
}

/// Retry phases. `Inspect` carries the candidate pulled off the wire so the
/// verdict transition stays a pure function.
#[derive(Debug)]
enum Phase {
    Request { attempt: u32 },
    Inspect { attempt: u32, candidate: String },
    Settled(TurnReply),
}

/// Decide what follows a verdict: surface the candidate, burn another
/// attempt, or settle on the fallback question.
fn after_inspection(attempt: u32, candidate: &str, verdict: Verdict, max_attempts: u32) -> Phase {
    if verdict.ok {
        return Phase::Settled(TurnReply {
            text: candidate.to_owned(),
            origin: ReplyOrigin::Generated { attempts: attempt },
        });
    }
    if attempt < max_attempts {
        Phase::Request {
            attempt: attempt + 1,
        }
    } else {
        Phase::Settled(TurnReply {
            text: FALLBACK_QUESTION.to_owned(),
            origin: ReplyOrigin::Fallback,
        })
    }
}

/// Condense one turn's text for the wire: collapse whitespace runs, trim,
/// cap at [`PAYLOAD_TURN_MAX_CHARS`].
#[must_use]
pub fn condense_for_payload(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(PAYLOAD_TURN_MAX_CHARS * 4));
    let mut count = 0;
    for word in text.split_whitespace() {
        if count > 0 {
            out.push(' ');
            count += 1;
        }
        for ch in word.chars() {
            if count >= PAYLOAD_TURN_MAX_CHARS {
                return out;
            }
            out.push(ch);
            count += 1;
        }
        if count >= PAYLOAD_TURN_MAX_CHARS {
            return out;
        }
    }
    out
}

fn doc_excerpt(doc: &Value) -> String {
    let raw = doc.to_string();
    if raw.chars().count() <= DOC_LOG_EXCERPT {
        return raw;
    }
    let mut excerpt: String = raw.chars().take(DOC_LOG_EXCERPT).collect();
    excerpt.push_str("...");
    excerpt
}

/// Runs the generate / inspect / settle loop for one turn.
pub struct ReplyOrchestrator<B> {
    backend: B,
    contract: ReplyContract,
    sanitizer: Sanitizer,
    options: GenerationOptions,
    preamble: String,
    max_attempts: u32,
}

impl<B: GenerationBackend> ReplyOrchestrator<B> {
    /// Orchestrator with the persona defaults: single-question contract,
    /// built-in sanitizer table, persona preamble, three attempts.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            contract: ReplyContract::single_question(),
            sanitizer: Sanitizer::default(),
            options: GenerationOptions::default(),
            preamble: QUESTION_PREAMBLE.to_owned(),
            max_attempts: MAX_ATTEMPTS,
        }
    }

    /// Replace the reply contract.
    #[must_use]
    pub fn with_contract(mut self, contract: ReplyContract) -> Self {
        self.contract = contract;
        self
    }

    /// Replace the vocabulary sanitizer.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Replace the sampling options.
    #[must_use]
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the instruction preamble.
    #[must_use]
    pub fn with_preamble(mut self, preamble: impl Into<String>) -> Self {
        self.preamble = preamble.into();
        self
    }

    /// Set the attempt budget. Clamped to at least one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Produce one reply for the given recent history (newest user turn
    /// last). Never returns empty text.
    pub async fn reply(&self, history: &[Turn]) -> TurnReply {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let request = self.build_request(history);

        let mut phase = Phase::Request { attempt: 1 };
        loop {
            phase = match phase {
                Phase::Request { attempt } => self.run_attempt(&request, attempt, request_id).await,
                Phase::Inspect { attempt, candidate } => {
                    let verdict = self.contract.check(&candidate);
                    if let Some(reason) = verdict.reason {
                        warn!(
                            request_id = %request_id,
                            attempt,
                            max = self.max_attempts,
                            reason = reason.as_str(),
                            "candidate rejected"
                        );
                    }
                    after_inspection(attempt, &candidate, verdict, self.max_attempts)
                }
                Phase::Settled(reply) => {
                    let reply = self.finish(reply);
                    debug!(
                        request_id = %request_id,
                        origin = ?reply.origin,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "turn settled"
                    );
                    return reply;
                }
            };
        }
    }

    fn build_request(&self, history: &[Turn]) -> GenerationRequest {
        let turns = history
            .iter()
            .map(|turn| Turn {
                role: turn.role,
                text: condense_for_payload(&turn.text),
            })
            .collect();
        GenerationRequest {
            preamble: self.preamble.clone(),
            turns,
            options: self.options,
        }
    }

    async fn run_attempt(
        &self,
        request: &GenerationRequest,
        attempt: u32,
        request_id: Uuid,
    ) -> Phase {
        let call_started = Instant::now();
        match self.backend.generate(request).await {
            Ok(doc) => {
                debug!(
                    request_id = %request_id,
                    attempt,
                    provider = self.backend.name(),
                    elapsed_ms = call_started.elapsed().as_millis() as u64,
                    "generation call completed"
                );
                let raw = extract_reply_text(&doc);
                if raw.is_empty() {
                    warn!(
                        request_id = %request_id,
                        attempt,
                        document = %doc_excerpt(&doc),
                        "no text found in provider response"
                    );
                }
                Phase::Inspect {
                    attempt,
                    candidate: normalize_reply(&raw),
                }
            }
            Err(CallError::Overloaded) => {
                warn!(
                    request_id = %request_id,
                    attempt,
                    provider = self.backend.name(),
                    "provider overloaded"
                );
                Phase::Settled(TurnReply {
                    text: OVERLOADED_NOTICE.to_owned(),
                    origin: ReplyOrigin::Overloaded,
                })
            }
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    attempt,
                    provider = self.backend.name(),
                    error = %err,
                    "generation call failed"
                );
                Phase::Settled(TurnReply {
                    text: FAILURE_NOTICE.to_owned(),
                    origin: ReplyOrigin::Failure,
                })
            }
        }
    }

    /// Persona text (generated or fallback) is sanitized on the way out;
    /// status notices are not persona text and pass through untouched.
    fn finish(&self, reply: TurnReply) -> TurnReply {
        match reply.origin {
            ReplyOrigin::Generated { .. } | ReplyOrigin::Fallback => TurnReply {
                text: self.sanitizer.apply(&reply.text),
                origin: reply.origin,
            },
            _ => reply,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
