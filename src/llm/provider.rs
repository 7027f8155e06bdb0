//! Session construction from configuration

use super::{ChatSession, GeminiSession, LoggingSession, SessionConfig};
use crate::config::ConfigError;
use crate::persona;
use std::sync::Arc;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for the model session
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// API root, overridable for gateways and local fakes
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Create the conversation session with the guide persona and weather tool.
///
/// No network I/O happens here; the first request goes out on the first send.
pub fn create_session(config: &LlmConfig) -> Result<Arc<dyn ChatSession>, ConfigError> {
    let api_key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    let session_config = SessionConfig {
        model: config.model.clone(),
        system_instruction: persona::SYSTEM_INSTRUCTION.to_string(),
        tools: vec![persona::weather_tool_definition()],
    };

    let session = GeminiSession::new(api_key.to_string(), &config.base_url, session_config)
        .map_err(|e| ConfigError::HttpClient(e.message))?;

    tracing::info!(model = %config.model, base_url = %config.base_url, "Model session created");

    Ok(Arc::new(LoggingSession::new(Arc::new(session))))
}
