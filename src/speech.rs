//! Google Cloud text-to-speech client.
//!
//! Turns a validated reply into MP3 bytes via the `text:synthesize`
//! endpoint. Spoken text is trimmed and capped at [`MAX_SPOKEN_CHARS`]
//! characters; anything past the cap is replaced with a short spoken
//! notice so playback stays quick.

use std::time::Duration;

use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{EngineError, Result};

pub const DEFAULT_BASE_URL: &str = "https://texttospeech.googleapis.com";
pub const DEFAULT_VOICE: &str = "ja-JP-Neural2-B";
pub const DEFAULT_LANGUAGE: &str = "ja-JP";
pub const DEFAULT_SPEAKING_RATE: f32 = 1.05;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How much of an error body to keep in messages.
const ERROR_BODY_EXCERPT: usize = 500;

/// Upper bound on spoken text, in `char`s.
pub const MAX_SPOKEN_CHARS: usize = 400;

/// Appended in place of the tail when spoken text is truncated.
pub const TRUNCATION_NOTICE: &str = "。以下は読み上げを省略します。";

/// Connection settings for the synthesis endpoint.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    pub api_key: String,
    pub base_url: String,
    pub voice: String,
    pub language: String,
    pub speaking_rate: f32,
    pub timeout: Duration,
}

impl SpeechConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            voice: DEFAULT_VOICE.to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            speaking_rate: DEFAULT_SPEAKING_RATE,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    #[must_use]
    pub fn with_speaking_rate(mut self, rate: f32) -> Self {
        self.speaking_rate = rate;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Trim the text and cap it at [`MAX_SPOKEN_CHARS`], appending
/// [`TRUNCATION_NOTICE`] when the tail is dropped.
#[must_use]
pub fn prepare_spoken_text(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_SPOKEN_CHARS {
        return text.to_owned();
    }
    let mut spoken: String = text.chars().take(MAX_SPOKEN_CHARS).collect();
    spoken.push_str(TRUNCATION_NOTICE);
    spoken
}

/// Build the `text:synthesize` request body.
#[must_use]
pub fn build_synthesize_request(text: &str, config: &SpeechConfig) -> Value {
    json!({
        "input": { "text": text },
        "voice": {
            "languageCode": config.language,
            "name": config.voice,
        },
        "audioConfig": {
            "audioEncoding": "MP3",
            "speakingRate": config.speaking_rate,
        },
    })
}

/// Map a non-success synthesis response to an [`EngineError`].
#[must_use]
pub fn map_http_error(status: u16, body: &str) -> EngineError {
    let trimmed = body.trim();
    let detail = if trimmed.is_empty() {
        "no response body".to_owned()
    } else {
        trimmed.chars().take(ERROR_BODY_EXCERPT).collect()
    };
    EngineError::Speech(format!("synthesis returned HTTP {status}: {detail}"))
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    #[serde(default, rename = "audioContent")]
    audio_content: Option<String>,
}

/// HTTP client for Google Cloud TTS.
pub struct SpeechSynthesizer {
    config: SpeechConfig,
    client: reqwest::Client,
}

impl SpeechSynthesizer {
    #[must_use]
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/text:synthesize", self.config.base_url)
    }

    /// Synthesize `text` to MP3 bytes.
    ///
    /// # Errors
    ///
    /// [`EngineError::Input`] when the text is empty after trimming, and
    /// [`EngineError::Speech`] for transport failures, non-success status
    /// codes and undecodable response bodies.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let spoken = prepare_spoken_text(text);
        if spoken.is_empty() {
            return Err(EngineError::Input("no text to speak".to_owned()));
        }
        debug!(chars = spoken.chars().count(), "synthesizing speech");

        let body = build_synthesize_request(&spoken, &self.config);
        let response = self
            .client
            .post(self.endpoint())
            .timeout(self.config.timeout)
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Speech(format!("connection error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status.as_u16(), &body));
        }

        let parsed: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Speech(format!("invalid JSON response: {e}")))?;
        let encoded = parsed
            .audio_content
            .filter(|content| !content.is_empty())
            .ok_or_else(|| EngineError::Speech("response contained no audio".to_owned()))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| EngineError::Speech(format!("invalid base64 audio: {e}")))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
