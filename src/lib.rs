//! Toi: reflective-questioning conversation engine.
//!
//! This crate turns free-form user text into a single validated question:
//! Input → Governor → Generation → Extraction → Contract → Reply
//!
//! # Architecture
//!
//! The engine is built from small, independently testable stages:
//! - **Session**: owns one conversation log and its signal state
//! - **Governor**: watches user turns for sustained escalation and loops,
//!   answering from canned text when a short-circuit fires
//! - **Orchestrator**: drives generate → extract → validate under a bounded
//!   attempt budget, with canned outcomes for provider failure
//! - **Extraction**: pulls reply text out of heterogeneous provider JSON
//! - **Contract**: validates replies against the single-question persona
//!   rules, with a normalization pass in front
//! - **Speech**: synthesizes validated replies to MP3 via Google Cloud TTS

pub mod config;
pub mod contract;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod governor;
pub mod orchestrator;
pub mod persona;
pub mod provider;
pub mod sanitize;
pub mod session;
pub mod speech;

#[cfg(test)]
pub mod test_utils;

pub use config::EngineConfig;
pub use contract::{ReplyContract, Verdict, Violation};
pub use conversation::{ConversationLog, Role, Turn};
pub use error::{EngineError, Result};
pub use governor::{GovernorRules, ShortCircuit, SignalTracker};
pub use orchestrator::{ReplyOrchestrator, ReplyOrigin, TurnReply};
pub use provider::{GeminiBackend, GeminiConfig, GenerationBackend};
pub use session::ChatSession;
pub use speech::SpeechSynthesizer;
