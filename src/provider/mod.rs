//! Generation backend seam.
//!
//! The orchestrator talks to a [`GenerationBackend`] trait object so the
//! remote service can be swapped for a scripted fake in tests. The response
//! comes back as an untyped document; deciding what text it holds is the
//! extractor's job, not the backend's.

pub mod gemini;

pub use gemini::{GeminiBackend, GeminiConfig};

use crate::conversation::Turn;
use async_trait::async_trait;
use serde_json::Value;

/// Sampling and budget knobs forwarded with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub max_output_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 256,
            temperature: 0.7,
        }
    }
}

/// One generation request: the fixed instruction preamble plus the bounded
/// recent history, oldest first, newest user turn last.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub preamble: String,
    pub turns: Vec<Turn>,
    pub options: GenerationOptions,
}

/// How a backend call failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The provider reported overload (HTTP 503).
    #[error("provider overloaded")]
    Overloaded,

    /// Any other non-success status.
    #[error("provider returned HTTP {code}: {detail}")]
    Status { code: u16, detail: String },

    /// Connection, TLS, or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body was not JSON.
    #[error("malformed response body: {0}")]
    MalformedBody(String),
}

/// A remote text-generation service.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Run one generation call, returning the raw response document.
    async fn generate(&self, request: &GenerationRequest) -> Result<Value, CallError>;
}
