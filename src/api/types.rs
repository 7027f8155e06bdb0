//! API request and response types

use crate::chat::Snapshot;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Response for an accepted chat message
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub accepted: bool,
    /// Id of the recorded user message
    pub message_id: String,
}

/// Conversation snapshot plus session details
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub model: String,
}

/// Quick-reply prompts shown under the conversation
#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<&'static str>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
