use std::time::Duration;

use tracing::Level;
use tutor_core::{Persona, SamplerConfig};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for the model relay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    pub room_name: String,
    pub agent_identity: String,
    pub provider: Provider,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub chat_model: String,
    pub persona: Persona,
    pub relay_timeout: Duration,
    pub sampler: SamplerConfig,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let livekit_url = require("LIVEKIT_URL")?;
        let livekit_api_key = require("LIVEKIT_API_KEY")?;
        let livekit_api_secret = require("LIVEKIT_API_SECRET")?;

        let room_name = std::env::var("ROOM_NAME").unwrap_or_else(|_| "classroom".to_string());
        let agent_identity =
            std::env::var("AGENT_IDENTITY").unwrap_or_else(|_| "tutor-agent".to_string());

        let provider_str =
            std::env::var("MODEL_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let provider = match provider_str.to_lowercase().as_str() {
            "gemini" => Provider::Gemini,
            _ => Provider::OpenAI,
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let persona_str = std::env::var("AGENT_PERSONA").unwrap_or_else(|_| "tutor".to_string());
        let persona = match persona_str.to_lowercase().as_str() {
            "reader" => Persona::ScreenReader,
            _ => Persona::MathTutor,
        };

        let relay_timeout =
            Duration::from_secs(parse_var("RELAY_TIMEOUT_SECS", 30u64, |raw| raw.parse().ok())?);

        let speaking_rate = parse_var("SPEAKING_FRAME_RATE", 1.0f64, parse_positive)?;
        let idle_rate = parse_var("NOT_SPEAKING_FRAME_RATE", 0.5f64, parse_positive)?;
        let sampler = SamplerConfig {
            speaking_rate,
            idle_rate,
        };

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        match provider {
            Provider::OpenAI => {
                if openai_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                    ));
                }
            }
            Provider::Gemini => {
                if gemini_api_key.is_none() {
                    return Err(ConfigError::MissingVar(
                        "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            livekit_url,
            livekit_api_key,
            livekit_api_secret,
            room_name,
            agent_identity,
            provider,
            openai_api_key,
            gemini_api_key,
            chat_model,
            persona,
            relay_timeout,
            sampler,
            log_level,
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

/// Parses an optional environment variable, failing loudly on a present but
/// unusable value.
fn parse_var<T>(
    name: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => parse(&raw)
            .ok_or_else(|| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}

fn parse_positive(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| *value > 0.0)
}
