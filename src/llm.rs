//! Model session abstraction
//!
//! A session is a stateful exchange with a hosted model. Each send opens a
//! reply stream of fragments that ends when the stream is exhausted.

mod error;
mod gemini;
mod provider;
mod sse;
mod types;

#[cfg(test)]
mod proptests;

pub use error::LlmError;
#[cfg(test)]
pub use error::LlmErrorKind;
pub use gemini::GeminiSession;
pub use provider::{create_session, LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use types::*;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Ordered, finite, non-restartable stream of reply fragments
pub type FragmentStream = BoxStream<'static, Result<StreamFragment, LlmError>>;

/// Common interface for a conversational model session
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Send input into the session and open the reply stream
    async fn send_message_stream(&self, input: SessionInput) -> Result<FragmentStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ChatSession + ?Sized> ChatSession for Arc<T> {
    async fn send_message_stream(&self, input: SessionInput) -> Result<FragmentStream, LlmError> {
        (**self).send_message_stream(input).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

/// Logging wrapper for chat sessions
pub struct LoggingSession {
    inner: Arc<dyn ChatSession>,
    model_id: String,
}

impl LoggingSession {
    pub fn new(inner: Arc<dyn ChatSession>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl ChatSession for LoggingSession {
    async fn send_message_stream(&self, input: SessionInput) -> Result<FragmentStream, LlmError> {
        let kind = input.kind();
        let start = std::time::Instant::now();
        let result = self.inner.send_message_stream(input).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::info!(
                    model = %self.model_id,
                    input = kind,
                    duration_ms = %duration.as_millis(),
                    "Model stream opened"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    input = kind,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    retryable = e.kind.is_retryable(),
                    "Model stream failed to open"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
