//! Model backend configuration
//!
//! Read once at start from the environment (after `.env` has been loaded).

use agent_core::{AgentError, Result};

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Which key was found, and so which defaults apply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    OpenRouter,
    OpenAi,
}

impl Backend {
    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenRouter => OPENROUTER_BASE_URL,
            Self::OpenAi => OPENAI_BASE_URL,
        }
    }

    pub const fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => "anthropic/claude-3-haiku",
            Self::OpenAi => "gpt-3.5-turbo",
        }
    }
}

/// Chat-completions backend configuration
#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub backend: Backend,

    /// Base URL; `/chat/completions` is appended
    pub base_url: String,

    pub api_key: String,

    /// Model identifier (e.g., "anthropic/claude-3-haiku", "gpt-4o-mini")
    pub model: String,

    /// Temperature for sampling
    pub temperature: f32,

    /// Maximum tokens to generate per request
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl ModelConfig {
    pub fn new(backend: Backend, api_key: impl Into<String>) -> Self {
        Self {
            backend,
            base_url: backend.default_base_url().into(),
            api_key: api_key.into(),
            model: backend.default_model().into(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: 120,
        }
    }

    /// `OPENROUTER_API_KEY` wins over `OPENAI_API_KEY`; one of them is required.
    /// `FS_AGENT_BASE_URL` and `FS_AGENT_MODEL` override the backend defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openrouter = present("OPENROUTER_API_KEY");
        let openai = present("OPENAI_API_KEY");
        tracing::info!(
            openrouter = openrouter.is_some(),
            openai = openai.is_some(),
            "API keys in environment"
        );

        let mut config = match (openrouter, openai) {
            (Some(key), _) => Self::new(Backend::OpenRouter, key),
            (None, Some(key)) => Self::new(Backend::OpenAi, key),
            (None, None) => {
                return Err(AgentError::Config(
                    "Either OPENROUTER_API_KEY or OPENAI_API_KEY must be set".into(),
                ));
            }
        };

        if let Some(url) = present("FS_AGENT_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = present("FS_AGENT_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}
