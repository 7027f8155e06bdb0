//! Scripted session for testing
//!
//! Replies are queued up front and handed out one per send, so turns can be
//! exercised without network I/O.

use crate::llm::{ChatSession, FragmentStream, LlmError, SessionInput, StreamFragment};
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply
pub enum ScriptedReply {
    /// Yield these items, then end
    Fragments(Vec<Result<StreamFragment, LlmError>>),
    /// Yield these fragments, then never produce another
    Stall(Vec<StreamFragment>),
    /// Fail to open the stream
    OpenError(LlmError),
}

impl ScriptedReply {
    /// A plain text reply split into the given deltas
    pub fn text(chunks: &[&str]) -> Self {
        ScriptedReply::Fragments(
            chunks
                .iter()
                .map(|c| Ok(StreamFragment::text(*c)))
                .collect(),
        )
    }
}

/// Session that replays queued replies and records every input
pub struct ScriptedSession {
    replies: Mutex<VecDeque<ScriptedReply>>,
    /// Record of all inputs sent
    pub inputs: Mutex<Vec<SessionInput>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Queue a reply
    pub fn with_reply(self, reply: ScriptedReply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Get recorded inputs
    pub fn recorded_inputs(&self) -> Vec<SessionInput> {
        self.inputs.lock().unwrap().clone()
    }
}

impl Default for ScriptedSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send_message_stream(&self, input: SessionInput) -> Result<FragmentStream, LlmError> {
        self.inputs.lock().unwrap().push(input);
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::OpenError(LlmError::network("No scripted reply queued")));

        match reply {
            ScriptedReply::Fragments(items) => Ok(stream::iter(items).boxed()),
            ScriptedReply::Stall(fragments) => Ok(stream::iter(fragments.into_iter().map(Ok))
                .chain(stream::pending())
                .boxed()),
            ScriptedReply::OpenError(e) => Err(e),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
