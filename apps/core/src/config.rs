//! Pipeline configuration.
//!
//! Loaded from the environment (a `.env` file is honoured by the binary) and
//! validated once at startup. Nothing here is consulted per utterance except
//! through the values copied into each stage.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::error::AppError;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-70b-instruct";
pub const DEFAULT_REFERER: &str = "https://hack.local";
pub const DEFAULT_TITLE: &str = "HygieiAI";
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HISTORY_CAP: usize = 24;
pub const DEFAULT_CONTEXT_WINDOW: usize = 16;
pub const DEFAULT_CONVERSATION_IDLE_SECS: u64 = 3600;
pub const DEFAULT_MAX_CONVERSATIONS: usize = 10_000;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    /// Bunyan-style JSON lines.
    Json,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(LogFormat::Compact),
            "json" | "bunyan" => Ok(LogFormat::Json),
            other => Err(AppError::Config(format!("Unknown log format `{}`", other))),
        }
    }
}

/// Everything the pipeline needs to talk to the completion service and to
/// bound its own state.
#[derive(Clone, Validate)]
pub struct PipelineConfig {
    /// Bearer token for the completion service.
    #[validate(length(min = 1))]
    pub api_key: String,
    #[validate(url)]
    pub base_url: String,
    #[validate(length(min = 1))]
    pub classifier_model: String,
    #[validate(length(min = 1))]
    pub responder_model: String,
    #[validate(length(min = 1))]
    pub safety_model: String,
    /// Sent as `HTTP-Referer`.
    pub referer: String,
    /// Sent as `X-Title`.
    pub title: String,
    #[validate(range(min = 1, max = 600))]
    pub call_timeout_secs: u64,
    /// Maximum stored turns per conversation.
    #[validate(range(min = 2))]
    pub history_cap: usize,
    /// Maximum turns shown to the responder model.
    pub context_window: usize,
    #[validate(range(min = 1))]
    pub conversation_idle_secs: u64,
    #[validate(range(min = 1))]
    pub max_conversations: usize,
    pub log_format: LogFormat,
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("classifier_model", &self.classifier_model)
            .field("responder_model", &self.responder_model)
            .field("safety_model", &self.safety_model)
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("history_cap", &self.history_cap)
            .field("context_window", &self.context_window)
            .field("conversation_idle_secs", &self.conversation_idle_secs)
            .field("max_conversations", &self.max_conversations)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl PipelineConfig {
    /// Creates a configuration with default values and the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            classifier_model: DEFAULT_MODEL.to_string(),
            responder_model: DEFAULT_MODEL.to_string(),
            safety_model: DEFAULT_MODEL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            history_cap: DEFAULT_HISTORY_CAP,
            context_window: DEFAULT_CONTEXT_WINDOW,
            conversation_idle_secs: DEFAULT_CONVERSATION_IDLE_SECS,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
            log_format: LogFormat::Compact,
        }
    }

    /// Points the completion client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reads the configuration from environment variables and validates it.
    ///
    /// `OPENROUTER_API_KEY` is mandatory; every other variable has a default.
    pub fn from_env() -> Result<Self, AppError> {
        let api_key = env::var("OPENROUTER_API_KEY").map_err(|_| {
            AppError::Config("OPENROUTER_API_KEY environment variable not set".to_string())
        })?;

        let config = Self {
            api_key,
            base_url: env_or("OPENROUTER_BASE_URL", DEFAULT_BASE_URL),
            classifier_model: env_or("MODEL_CLASSIFIER", DEFAULT_MODEL),
            responder_model: env_or("MODEL_RESPONDER", DEFAULT_MODEL),
            safety_model: env_or("MODEL_SAFETY", DEFAULT_MODEL),
            referer: env_or("OPENROUTER_REFERER", DEFAULT_REFERER),
            title: env_or("OPENROUTER_TITLE", DEFAULT_TITLE),
            call_timeout_secs: parse_env("HYGIEIA_CALL_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS)?,
            history_cap: parse_env("HYGIEIA_HISTORY_CAP", DEFAULT_HISTORY_CAP)?,
            context_window: parse_env("HYGIEIA_CONTEXT_WINDOW", DEFAULT_CONTEXT_WINDOW)?,
            conversation_idle_secs: parse_env(
                "HYGIEIA_CONVERSATION_IDLE_SECS",
                DEFAULT_CONVERSATION_IDLE_SECS,
            )?,
            max_conversations: parse_env("HYGIEIA_MAX_CONVERSATIONS", DEFAULT_MAX_CONVERSATIONS)?,
            log_format: match env::var("HYGIEIA_LOG_FORMAT") {
                Ok(raw) => raw.parse()?,
                Err(_) => LogFormat::default(),
            },
        };

        config.validated()
    }

    /// Runs field validation plus the cross-field checks.
    pub fn validated(self) -> Result<Self, AppError> {
        self.validate()?;
        if self.context_window > self.history_cap {
            return Err(AppError::Validation(format!(
                "context window ({}) cannot exceed history cap ({})",
                self.context_window, self.history_cap
            )));
        }
        Ok(self)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn conversation_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.conversation_idle_secs)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            AppError::Config(format!("Invalid value `{}` for {}", raw, key))
        }),
        _ => Ok(default),
    }
}
