//! Turn-level error types

use crate::llm::LlmError;
use std::time::Duration;
use thiserror::Error;

/// Why a submitted message was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a reply is already in progress")]
    Busy,
}

/// Why a turn ended without a complete reply
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("model transport failed: {0}")]
    Transport(#[from] LlmError),
    #[error("no reply fragment within {0:?}")]
    Timeout(Duration),
    #[error("turn cancelled")]
    Cancelled,
}

impl TurnError {
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Transport(e) => e.kind.as_str(),
            TurnError::Timeout(_) => "timeout",
            TurnError::Cancelled => "cancelled",
        }
    }
}
