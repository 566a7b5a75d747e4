use ensemble_core::{EnsembleError, EnsembleResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic messages API.
    Claude,
    /// OpenAI chat completions API.
    OpenAi,
    /// OpenRouter — OpenAI-compatible multi-provider gateway.
    OpenRouter,
    /// Groq cloud inference — OpenAI-compatible API.
    Groq,
}

impl FromStr for LlmProvider {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(Self::Claude),
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "groq" => Ok(Self::Groq),
            other => Err(EnsembleError::Config(format!(
                "Unknown provider: {other}"
            ))),
        }
    }
}

/// Configuration of the active model: provider, credentials, and defaults.
///
/// Personas may override `temperature` and `max_tokens` per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which provider API to speak.
    pub provider: LlmProvider,
    /// Provider-specific model identifier.
    pub model_id: String,
    /// API key sent with every request.
    pub api_key: String,
    /// Base URL override; defaults per provider when absent.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Default completion token limit.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

impl ModelConfig {
    /// The base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }

    /// Parses a config from TOML text.
    pub fn from_toml_str(text: &str) -> EnsembleResult<Self> {
        toml::from_str(text).map_err(|e| EnsembleError::Config(e.to_string()))
    }

    /// Parses a config from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> EnsembleResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Resolves the active model configuration.
    ///
    /// Reads the TOML file named by `ENSEMBLE_CONFIG` (default
    /// `ensemble.toml`) when present, then applies environment overrides:
    /// `ENSEMBLE_PROVIDER`, `ENSEMBLE_MODEL`, `ENSEMBLE_API_KEY`,
    /// `ENSEMBLE_BASE_URL`. Fails when no API key is configured by either
    /// source.
    pub fn resolve() -> EnsembleResult<Self> {
        let path = std::env::var("ENSEMBLE_CONFIG").unwrap_or_else(|_| "ensemble.toml".to_string());

        let mut config = if Path::new(&path).exists() {
            Self::from_toml_file(&path)?
        } else {
            Self {
                provider: LlmProvider::OpenAi,
                model_id: "gpt-4o-mini".to_string(),
                api_key: String::new(),
                api_base_url: None,
                temperature: default_temperature(),
                max_tokens: default_max_tokens(),
            }
        };

        if let Ok(provider) = std::env::var("ENSEMBLE_PROVIDER") {
            config.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("ENSEMBLE_MODEL") {
            config.model_id = model;
        }
        if let Ok(key) = std::env::var("ENSEMBLE_API_KEY") {
            config.api_key = key;
        }
        if let Ok(url) = std::env::var("ENSEMBLE_BASE_URL") {
            config.api_base_url = Some(url);
        }

        if config.api_key.is_empty() {
            return Err(EnsembleError::Config(
                "No API key configured: set ENSEMBLE_API_KEY or provide an ensemble.toml"
                    .to_string(),
            ));
        }

        Ok(config)
    }
}
