//! Process configuration from environment variables

use crate::llm::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 60;

/// Startup configuration failure; fatal, no session is created
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GEMINI_API_KEY (or API_KEY) environment variable not set")]
    MissingApiKey,
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("Failed to initialise HTTP client: {0}")]
    HttpClient(String),
}

/// Server and session configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub port: u16,
    /// Longest wait for the next reply fragment before a turn is abandoned
    pub stream_timeout: Duration,
    /// Fixed seed for the simulated weather source; entropy-seeded when unset
    pub weather_seed: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("API_KEY"))
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let llm = LlmConfig {
            api_key: Some(api_key),
            model: lookup("MONSOON_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };

        let port = parse_var(&lookup, "MONSOON_PORT")?.unwrap_or(DEFAULT_PORT);
        let timeout_secs: u64 =
            parse_var(&lookup, "MONSOON_STREAM_TIMEOUT_SECS")?.unwrap_or(DEFAULT_STREAM_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MONSOON_STREAM_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }
        let weather_seed = parse_var(&lookup, "MONSOON_WEATHER_SEED")?;

        Ok(Self {
            llm,
            port,
            stream_timeout: Duration::from_secs(timeout_secs),
            weather_seed,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}
