//! Engine configuration: TOML file loading with environment credentials.
//!
//! Every section is optional in the file; missing fields fall back to the
//! built-in defaults. API keys may come from the file or from the
//! environment (`GEMINI_API_KEY`, `GOOGLE_TTS_API_KEY`); [`EngineConfig::load`]
//! applies the environment last, so it wins over file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::contract::{self, ReplyContract};
use crate::error::{EngineError, Result};
use crate::governor::GovernorRules;
use crate::provider::{GeminiConfig, GenerationOptions};
use crate::speech::SpeechConfig;

/// Environment variable consulted for the generation API key.
pub const GENERATION_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable consulted for the synthesis API key.
pub const SYNTHESIS_KEY_ENV: &str = "GOOGLE_TTS_API_KEY";

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reply generation settings (provider endpoint, model, sampling).
    pub generation: GenerationConfig,
    /// Speech synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Dialogue governor rules (escalation and loop detection).
    pub governor: GovernorRules,
    /// Reply contract the generated text must satisfy.
    pub contract: ContractConfig,
    /// Per-session settings.
    pub session: SessionConfig,
}

/// Reply generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// API key. When absent, `GEMINI_API_KEY` fills it in via
    /// [`EngineConfig::load`].
    pub api_key: Option<String>,
    /// Base URL of the generation endpoint.
    pub base_url: String,
    /// Model identifier appended to the endpoint path.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum tokens to generate per reply.
    pub max_output_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let options = GenerationOptions::default();
        Self {
            api_key: None,
            base_url: crate::provider::gemini::DEFAULT_BASE_URL.to_owned(),
            model: crate::provider::gemini::DEFAULT_MODEL.to_owned(),
            timeout_secs: 30,
            max_output_tokens: options.max_output_tokens,
            temperature: options.temperature,
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Whether replies are synthesized to audio.
    pub enabled: bool,
    /// API key. When absent, `GOOGLE_TTS_API_KEY` fills it in via
    /// [`EngineConfig::load`].
    pub api_key: Option<String>,
    /// Base URL of the synthesis endpoint.
    pub base_url: String,
    /// Voice name.
    pub voice: String,
    /// BCP-47 language code for the voice.
    pub language: String,
    /// Playback rate multiplier.
    pub speaking_rate: f32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: crate::speech::DEFAULT_BASE_URL.to_owned(),
            voice: crate::speech::DEFAULT_VOICE.to_owned(),
            language: crate::speech::DEFAULT_LANGUAGE.to_owned(),
            speaking_rate: crate::speech::DEFAULT_SPEAKING_RATE,
            timeout_secs: 30,
        }
    }
}

/// Reply contract configuration. Patterns are regex sources, compiled by
/// [`ContractConfig::build`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Minimum reply length in `char`s.
    pub min_chars: Option<usize>,
    /// Maximum reply length in `char`s.
    pub max_chars: Option<usize>,
    /// Reject replies containing line breaks.
    pub single_line: bool,
    /// Required reply endings. Empty disables the rule.
    pub terminators: Vec<String>,
    /// Literal substrings that fail a reply.
    pub forbidden_terms: Vec<String>,
    /// Regex sources that fail a reply.
    pub forbidden_patterns: Vec<String>,
}

impl Default for ContractConfig {
    fn default() -> Self {
        let contract = ReplyContract::default();
        Self {
            min_chars: contract.min_chars,
            max_chars: contract.max_chars,
            single_line: contract.single_line,
            terminators: contract.terminators,
            forbidden_terms: contract.forbidden_terms,
            forbidden_patterns: contract
                .forbidden_patterns
                .iter()
                .map(|pattern| pattern.as_str().to_owned())
                .collect(),
        }
    }
}

impl ContractConfig {
    /// Compile the configured patterns into a usable [`ReplyContract`].
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when a pattern does not compile.
    pub fn build(&self) -> Result<ReplyContract> {
        Ok(ReplyContract {
            min_chars: self.min_chars,
            max_chars: self.max_chars,
            single_line: self.single_line,
            terminators: self.terminators.clone(),
            forbidden_terms: self.forbidden_terms.clone(),
            forbidden_patterns: contract::compile_patterns(&self.forbidden_patterns)?,
        })
    }
}

/// Per-session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Recent turns sent with each generation request.
    pub history_window: usize,
    /// Generation attempts before falling back to the canned question.
    pub max_attempts: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: crate::session::HISTORY_WINDOW,
            max_attempts: crate::orchestrator::MAX_ATTEMPTS,
        }
    }
}

/// Application config directory.
///
/// Resolves to `dirs::config_dir()/toi/` by default. Override with the
/// `TOI_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("TOI_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("toi"))
        .unwrap_or_else(|| PathBuf::from("/tmp/toi-config"))
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from [`config_file`] when it exists, otherwise start from
    /// defaults, then apply environment credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = config_file();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.overlay_env();
        Ok(config)
    }

    /// Pull API keys from the environment. Non-empty environment values
    /// replace file values.
    pub fn overlay_env(&mut self) {
        if let Ok(key) = std::env::var(GENERATION_KEY_ENV) {
            if !key.trim().is_empty() {
                self.generation.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var(SYNTHESIS_KEY_ENV) {
            if !key.trim().is_empty() {
                self.synthesis.api_key = Some(key);
            }
        }
    }

    /// Build the generation client configuration.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when no generation API key is available.
    pub fn build_generation(&self) -> Result<GeminiConfig> {
        let key = self
            .generation
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "missing generation API key: set generation.api_key or {GENERATION_KEY_ENV}"
                ))
            })?;
        Ok(GeminiConfig::new(key)
            .with_base_url(&self.generation.base_url)
            .with_model(&self.generation.model)
            .with_timeout(Duration::from_secs(self.generation.timeout_secs)))
    }

    /// Sampling options for each generation request.
    #[must_use]
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            max_output_tokens: self.generation.max_output_tokens,
            temperature: self.generation.temperature,
        }
    }

    /// Build the synthesis client configuration.
    ///
    /// # Errors
    ///
    /// [`EngineError::Config`] when no synthesis API key is available.
    pub fn build_synthesis(&self) -> Result<SpeechConfig> {
        let key = self
            .synthesis
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "missing synthesis API key: set synthesis.api_key or {SYNTHESIS_KEY_ENV}"
                ))
            })?;
        Ok(SpeechConfig::new(key)
            .with_base_url(&self.synthesis.base_url)
            .with_voice(&self.synthesis.voice)
            .with_language(&self.synthesis.language)
            .with_speaking_rate(self.synthesis.speaking_rate)
            .with_timeout(Duration::from_secs(self.synthesis.timeout_secs)))
    }

    /// Check that the configuration can produce a working engine.
    ///
    /// # Errors
    ///
    /// The first [`EngineError::Config`] found: a missing generation key, a
    /// contract pattern that does not compile, or (when synthesis is
    /// enabled) a missing synthesis key.
    pub fn validate(&self) -> Result<()> {
        self.build_generation()?;
        self.contract.build()?;
        if self.synthesis.enabled {
            self.build_synthesis()?;
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn default_config_builds_the_persona_contract() {
        let config = EngineConfig::default();
        let contract = config.contract.build().unwrap();
        assert_eq!(contract.min_chars, Some(10));
        assert_eq!(contract.max_chars, Some(80));
        assert!(contract.single_line);
        assert!(!contract.forbidden_patterns.is_empty());
    }

    #[test]
    fn default_governor_thresholds_are_sane() {
        let config = EngineConfig::default();
        assert!(config.governor.escalation_threshold > 0);
        assert!(config.governor.similarity_threshold > 0.0);
        assert!(config.governor.similarity_threshold <= 1.0);
        assert!(!config.governor.charged_terms.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let mut config = EngineConfig::default();
        config.generation.model = "gemini-test".to_owned();
        config.governor.escalation_threshold = 5;
        config.contract.max_chars = Some(60);
        config.session.history_window = 10;

        config.save_to_file(&path).unwrap();
        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded.generation.model, "gemini-test");
        assert_eq!(loaded.governor.escalation_threshold, 5);
        assert_eq!(loaded.contract.max_chars, Some(60));
        assert_eq!(loaded.session.history_window, 10);
    }

    #[test]
    fn partial_file_keeps_defaults_elsewhere() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[generation]\nmodel = \"gemini-1.5-pro\"\n").unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.generation.model, "gemini-1.5-pro");
        assert_eq!(
            config.generation.base_url,
            crate::provider::gemini::DEFAULT_BASE_URL
        );
        assert_eq!(config.session.max_attempts, 3);
        assert_eq!(config.synthesis.voice, crate::speech::DEFAULT_VOICE);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = EngineConfig::from_file(Path::new("/nonexistent/toi/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn build_generation_requires_a_key() {
        let config = EngineConfig::default();
        let err = config.build_generation().unwrap_err();
        assert!(err.to_string().contains(GENERATION_KEY_ENV));
    }

    #[test]
    fn build_generation_uses_configured_fields() {
        let mut config = EngineConfig::default();
        config.generation.api_key = Some("k".to_owned());
        config.generation.base_url = "http://localhost:9999".to_owned();
        config.generation.model = "gemini-test".to_owned();
        let built = config.build_generation().unwrap();
        assert_eq!(built.base_url, "http://localhost:9999");
        assert_eq!(built.model, "gemini-test");
    }

    #[test]
    fn blank_file_key_counts_as_missing() {
        let mut config = EngineConfig::default();
        config.generation.api_key = Some("   ".to_owned());
        assert!(config.build_generation().is_err());
    }

    #[test]
    fn build_synthesis_requires_a_key() {
        let config = EngineConfig::default();
        let err = config.build_synthesis().unwrap_err();
        assert!(err.to_string().contains(SYNTHESIS_KEY_ENV));
    }

    #[test]
    fn validate_skips_synthesis_when_disabled() {
        let mut config = EngineConfig::default();
        config.generation.api_key = Some("k".to_owned());
        assert!(config.validate().is_ok());
        config.synthesis.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_a_bad_contract_pattern() {
        let mut config = EngineConfig::default();
        config.generation.api_key = Some("k".to_owned());
        config.contract.forbidden_patterns.push("[unclosed".to_owned());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[unclosed"));
    }

    #[test]
    fn generation_options_carry_sampling_fields() {
        let mut config = EngineConfig::default();
        config.generation.max_output_tokens = 64;
        config.generation.temperature = 0.2;
        let options = config.generation_options();
        assert_eq!(options.max_output_tokens, 64);
        assert!((options.temperature - 0.2).abs() < 1e-6);
    }

    #[test]
    fn config_file_ends_with_config_toml() {
        let path = config_file();
        let s = path.to_string_lossy();
        assert!(s.ends_with("config.toml"), "config_file: {s}");
    }

    #[test]
    fn overlay_env_replaces_file_value() {
        let original = std::env::var_os(GENERATION_KEY_ENV);

        // SAFETY: restored below; only this test writes this variable.
        unsafe { std::env::set_var(GENERATION_KEY_ENV, "env-key") };
        let mut config = EngineConfig::default();
        config.generation.api_key = Some("file-key".to_owned());
        config.overlay_env();
        assert_eq!(config.generation.api_key.as_deref(), Some("env-key"));

        match original {
            Some(val) => unsafe { std::env::set_var(GENERATION_KEY_ENV, val) },
            None => unsafe { std::env::remove_var(GENERATION_KEY_ENV) },
        }
    }

    #[test]
    fn config_dir_override_via_env() {
        let key = "TOI_CONFIG_DIR";
        let original = std::env::var_os(key);

        // SAFETY: restored below; only this test writes this variable.
        unsafe { std::env::set_var(key, "/custom/toi") };
        assert_eq!(config_dir(), PathBuf::from("/custom/toi"));

        match original {
            Some(val) => unsafe { std::env::set_var(key, val) },
            None => unsafe { std::env::remove_var(key) },
        }
    }

    #[test]
    fn config_serializes_to_toml() {
        let toml_str = toml::to_string_pretty(&EngineConfig::default()).unwrap();
        assert!(toml_str.contains("escalation_threshold"));
        assert!(toml_str.contains("history_window"));
        assert!(toml_str.contains("speaking_rate"));
    }
}
