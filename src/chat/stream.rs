//! Reply stream processing
//!
//! Drains one reply stream into the store: visible text grows a single bot
//! message, image tags move the background, and tool calls are collected
//! for the runtime to act on once the stream ends.

use super::display::{extract_image_tag, DisplayState, ImageTag};
use super::error::TurnError;
use super::message::new_message_id;
use super::store::ConversationStore;
use crate::llm::{ChatSession, SessionInput, ToolCall};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Bounds applied to every wait on the model
#[derive(Debug, Clone)]
pub struct TurnLimits {
    /// Longest wait for the stream to open or for its next fragment
    pub idle_timeout: Duration,
    pub cancel: CancellationToken,
}

impl TurnLimits {
    pub fn new(idle_timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            idle_timeout,
            cancel,
        }
    }
}

/// Await `fut` unless the turn is cancelled or it goes idle too long
pub(crate) async fn bounded<T>(
    limits: &TurnLimits,
    fut: impl Future<Output = T>,
) -> Result<T, TurnError> {
    tokio::select! {
        biased;
        () = limits.cancel.cancelled() => Err(TurnError::Cancelled),
        result = tokio::time::timeout(limits.idle_timeout, fut) => {
            result.map_err(|_| TurnError::Timeout(limits.idle_timeout))
        }
    }
}

/// Text of the bot message being built from one reply stream
#[derive(Debug)]
pub struct ReplyAccumulator {
    id: String,
    text: String,
    started: bool,
}

impl ReplyAccumulator {
    /// `prefix` names the message id family, e.g. `bot` or `bot-final`
    pub fn new(prefix: &str) -> Self {
        Self {
            id: new_message_id(prefix),
            text: String::new(),
            started: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether any visible text has arrived yet
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Append a delta; returns the new display if it completed an image tag.
    ///
    /// Extraction runs over the whole accumulated text so a tag split
    /// across fragments is still found once its closing bracket arrives.
    /// Every complete tag is stripped; the last one sets the display.
    pub fn push(&mut self, delta: &str) -> Option<DisplayState> {
        self.started = true;
        self.text.push_str(delta);

        let mut display = None;
        while let Some(tag) = self.strip_next_tag() {
            tracing::info!(location = %tag.location, label = %tag.label, "Image tag in reply");
            display = Some(DisplayState::for_tag(&tag));
        }
        display
    }

    fn strip_next_tag(&mut self) -> Option<ImageTag> {
        let extraction = extract_image_tag(&self.text);
        let tag = extraction.tag?;
        self.text = extraction.text;
        Some(tag)
    }

    /// Trim trailing whitespace left behind by a stripped tag
    pub fn finish(&mut self) {
        let trimmed = self.text.trim_end().len();
        self.text.truncate(trimmed);
    }
}

/// What a fully drained reply stream produced
#[derive(Debug, Default)]
pub struct ReplyOutcome {
    /// Id of the bot message created for visible text, if any
    pub message_id: Option<String>,
    /// Every tool call seen, in arrival order
    pub tool_calls: Vec<ToolCall>,
}

/// Send `input` into the session and stream the reply into the store.
///
/// On error the text streamed so far stays in place; the caller decides
/// how to tell the user.
pub async fn send_and_stream<S: ChatSession + ?Sized>(
    session: &S,
    input: SessionInput,
    store: &ConversationStore,
    limits: &TurnLimits,
) -> Result<ReplyOutcome, TurnError> {
    let prefix = match input {
        SessionInput::Message(_) => "bot",
        SessionInput::ToolResponse(_) => "bot-final",
    };
    let mut fragments = bounded(limits, session.send_message_stream(input)).await??;

    let mut reply = ReplyAccumulator::new(prefix);
    let mut tool_calls = Vec::new();
    let mut fragment_count = 0usize;

    while let Some(fragment) = bounded(limits, fragments.next()).await? {
        let fragment = fragment?;
        fragment_count += 1;

        if let Some(delta) = fragment.visible_text() {
            if let Some(display) = reply.push(delta) {
                store.set_display(display);
            }
            store.upsert_bot(reply.id(), reply.text());
        }
        tool_calls.extend(fragment.function_calls);
    }

    let message_id = if reply.is_started() {
        reply.finish();
        store.upsert_bot(reply.id(), reply.text());
        Some(reply.id().to_string())
    } else {
        None
    };

    tracing::debug!(
        fragments = fragment_count,
        tool_calls = tool_calls.len(),
        text_len = reply.text().len(),
        "Reply stream drained"
    );

    Ok(ReplyOutcome {
        message_id,
        tool_calls,
    })
}
