//! Google Gemini `generateContent` adapter.
//!
//! One POST per attempt, no streaming. The instruction preamble rides as
//! the first user content entry; assistant history goes out under the
//! provider's `"model"` role. HTTP 503 maps to its own error variant
//! because the reply pipeline surfaces overload differently from every
//! other failure.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::conversation::Role;
use crate::provider::{CallError, GenerationBackend, GenerationRequest};

/// Public endpoint used when no override is configured.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when the config names none.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error bodies are cut to this many chars before they enter diagnostics.
const ERROR_BODY_EXCERPT: usize = 500;

// ── Configuration ──────────────────────────────────────────────

/// Configuration for the Gemini adapter.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Base URL (override for mock-server tests).
    pub base_url: String,
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create a config with the public endpoint and default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the base URL (useful for testing with mock servers).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the whole-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ── Request building ───────────────────────────────────────────

/// Build a `generateContent` request body from a generation request.
#[must_use]
pub fn build_generate_request(request: &GenerationRequest) -> Value {
    let mut contents = Vec::with_capacity(request.turns.len() + 1);
    if !request.preamble.is_empty() {
        contents.push(serde_json::json!({
            "role": "user",
            "parts": [{"text": request.preamble}],
        }));
    }
    for turn in &request.turns {
        contents.push(serde_json::json!({
            "role": wire_role(turn.role),
            "parts": [{"text": turn.text}],
        }));
    }
    serde_json::json!({
        "contents": contents,
        "generationConfig": {
            "maxOutputTokens": request.options.max_output_tokens,
            "temperature": request.options.temperature,
        },
    })
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

// ── Error mapping ──────────────────────────────────────────────

/// Map a non-success HTTP response to a call error.
#[must_use]
pub fn map_http_error(status: u16, body: &str) -> CallError {
    if status == 503 {
        return CallError::Overloaded;
    }
    CallError::Status {
        code: status,
        detail: body_excerpt(body),
    }
}

fn body_excerpt(body: &str) -> String {
    if body.is_empty() {
        return "no response body".to_owned();
    }
    body.chars().take(ERROR_BODY_EXCERPT).collect()
}

// ── Adapter ────────────────────────────────────────────────────

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiBackend {
    /// Create a new Gemini backend.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        Self { config, client }
    }

    /// Returns a reference to the backend configuration.
    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Value, CallError> {
        let url = self.endpoint();
        let body = build_generate_request(request);
        tracing::debug!(
            model = %self.config.model,
            turns = request.turns.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.config.timeout)
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Gemini request failed");
                CallError::Transport(format!("connection error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read body".into());
            tracing::error!(status = %status, "Gemini request returned error");
            return Err(map_http_error(status.as_u16(), &body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CallError::MalformedBody(format!("invalid JSON response: {e}")))
    }
}
