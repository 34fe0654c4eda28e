//! Session boundary: one owned conversation, governor consult, reply
//! orchestration.
//!
//! `submit` is the only way text enters the engine. Malformed input is
//! rejected before any state changes; everything else resolves to a
//! non-empty reply, whatever the provider did. The governor sees every
//! accepted user turn first and can answer from canned text without a
//! remote call.

use tracing::{debug, info};
use uuid::Uuid;

use crate::conversation::{ConversationLog, Turn};
use crate::error::{EngineError, Result};
use crate::governor::{ShortCircuit, SignalTracker};
use crate::orchestrator::{ReplyOrchestrator, ReplyOrigin, TurnReply};
use crate::persona::{EMPTY_REPLY_PLACEHOLDER, ESCALATION_PAUSE, GREETING, LOOP_REFOCUS};
use crate::provider::GenerationBackend;

/// How many recent turns ride along with each generation request.
pub const HISTORY_WINDOW: usize = 6;

/// Accepted user input length cap, in `char`s after trimming.
pub const INPUT_MAX_CHARS: usize = 2000;

/// One dialogue session. Owns the turn log and the signal state; sessions
/// share nothing with each other.
pub struct ChatSession<B> {
    id: Uuid,
    log: ConversationLog,
    tracker: SignalTracker,
    orchestrator: ReplyOrchestrator<B>,
    window: usize,
}

impl<B: GenerationBackend> ChatSession<B> {
    /// Fresh session seeded with the persona greeting.
    pub fn new(orchestrator: ReplyOrchestrator<B>) -> Self {
        let id = Uuid::new_v4();
        info!(session_id = %id, "session started");
        Self {
            id,
            log: ConversationLog::seeded(GREETING),
            tracker: SignalTracker::new(),
            orchestrator,
            window: HISTORY_WINDOW,
        }
    }

    /// Replace the signal tracker (custom governor rules).
    #[must_use]
    pub fn with_tracker(mut self, tracker: SignalTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set the recent-history window. Clamped to at least one turn.
    #[must_use]
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Submit one user turn and get the reply.
    ///
    /// Empty or over-long input is rejected with [`EngineError::Input`]
    /// before the log or tracker change. The returned reply text is never
    /// empty.
    pub async fn submit(&mut self, input: &str) -> Result<TurnReply> {
        let text = input.trim();
        if text.is_empty() {
            return Err(EngineError::Input("empty input".to_owned()));
        }
        let chars = text.chars().count();
        if chars > INPUT_MAX_CHARS {
            return Err(EngineError::Input(format!(
                "input too long: {chars} chars (limit {INPUT_MAX_CHARS})"
            )));
        }

        self.log.push(Turn::user(text));
        let signal = self.tracker.observe_user_turn(text);
        debug!(
            session_id = %self.id,
            signal = ?signal,
            escalation = self.tracker.escalation_count(),
            "user turn accepted"
        );

        let mut reply = match signal {
            Some(ShortCircuit::EscalationSummary) => TurnReply {
                text: ESCALATION_PAUSE.to_owned(),
                origin: ReplyOrigin::EscalationPause,
            },
            Some(ShortCircuit::LoopRefocus) => TurnReply {
                text: LOOP_REFOCUS.to_owned(),
                origin: ReplyOrigin::LoopRefocus,
            },
            None => self.orchestrator.reply(self.log.recent(self.window)).await,
        };

        // Boundary guarantee: callers never see empty reply text.
        if reply.text.trim().is_empty() {
            reply.text = EMPTY_REPLY_PLACEHOLDER.to_owned();
        }

        self.log.push(Turn::assistant(reply.text.clone()));
        Ok(reply)
    }

    /// Drop the conversation and signal state together and re-seed the
    /// greeting.
    pub fn reset(&mut self) {
        self.log.reset(GREETING);
        self.tracker.reset();
        info!(session_id = %self.id, "session reset");
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
