//! Google Gemini session implementation
//!
//! Talks to the `streamGenerateContent` endpoint in SSE mode. The session
//! owns the running conversation history; an exchange is appended to it only
//! once its reply stream has been drained without error, and function calls
//! the next input leaves unanswered are dropped before it is sent.

use super::sse::decode_sse;
use super::types::{
    FunctionResponse, SessionConfig, SessionInput, StreamFragment, ToolCall, ToolDefinition,
};
use super::{ChatSession, FragmentStream, LlmError};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

/// Ids handed out for calls that arrived without one; never sent back on the wire
const LOCAL_CALL_PREFIX: &str = "local-call-";

/// Gemini chat session
pub struct GeminiSession {
    client: Client,
    api_key: String,
    model: String,
    stream_url: String,
    system_instruction: String,
    tools: Vec<ToolDefinition>,
    history: Arc<Mutex<Vec<GeminiContent>>>,
}

impl GeminiSession {
    pub fn new(api_key: String, base_url: &str, config: SessionConfig) -> Result<Self, LlmError> {
        let stream_url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            base_url.trim_end_matches('/'),
            config.model
        );

        // No overall timeout: replies are long-lived streams, idle waits are
        // bounded by the caller.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model: config.model,
            stream_url,
            system_instruction: config.system_instruction,
            tools: config.tools,
            history: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// History plus the outbound turn, after dropping calls it leaves unanswered
    fn request_contents(&self, outbound: &GeminiContent) -> Vec<GeminiContent> {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        prune_unanswered_calls(&mut history, outbound);
        let mut contents = history.clone();
        contents.push(outbound.clone());
        contents
    }

    fn build_request(&self, contents: Vec<GeminiContent>) -> GeminiRequest {
        let system_instruction = if self.system_instruction.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    text: self.system_instruction.clone(),
                }],
            })
        };

        let tools = if self.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: self
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            system_instruction,
            tools,
        }
    }
}

#[async_trait]
impl ChatSession for GeminiSession {
    async fn send_message_stream(&self, input: SessionInput) -> Result<FragmentStream, LlmError> {
        let outbound = input_content(input);
        let contents = self.request_contents(&outbound);
        tracing::debug!(model = %self.model, contents = contents.len(), "Sending streamed request");
        let request = self.build_request(contents);

        let response = self
            .client
            .post(&self.stream_url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read error body: {e}")))?;
            return Err(match serde_json::from_str::<GeminiErrorResponse>(&body) {
                Ok(err) => LlmError::from_status(status, &err.error.message),
                Err(_) => LlmError::from_status(status, &body),
            });
        }

        let fragments = decode_sse(Box::pin(response.bytes_stream()), parse_chunk);
        Ok(RecordingStream::new(fragments, self.history.clone(), outbound).boxed())
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Translate host input into the user-side content of an exchange
fn input_content(input: SessionInput) -> GeminiContent {
    let parts = match input {
        SessionInput::Message(text) => vec![GeminiPart::Text { text }],
        SessionInput::ToolResponse(responses) => responses
            .into_iter()
            .map(|FunctionResponse { id, name, response }| GeminiPart::FunctionResponse {
                function_response: GeminiFunctionResponse {
                    id: wire_call_id(&id),
                    name,
                    response,
                },
            })
            .collect(),
    };
    GeminiContent {
        role: Some("user".to_string()),
        parts,
    }
}

fn wire_call_id(id: &str) -> Option<String> {
    if id.starts_with(LOCAL_CALL_PREFIX) {
        None
    } else {
        Some(id.to_string())
    }
}

/// Remove function calls in the trailing model turn that `outbound` does not
/// answer. Every call left in history then has a matching response.
fn prune_unanswered_calls(history: &mut Vec<GeminiContent>, outbound: &GeminiContent) {
    let Some(last) = history.last_mut() else {
        return;
    };
    if last.role.as_deref() != Some("model") {
        return;
    }

    let mut answered: Vec<(Option<&str>, &str)> = outbound
        .parts
        .iter()
        .filter_map(|part| match part {
            GeminiPart::FunctionResponse { function_response } => Some((
                function_response.id.as_deref(),
                function_response.name.as_str(),
            )),
            _ => None,
        })
        .collect();

    let before = last.parts.len();
    last.parts.retain(|part| {
        let GeminiPart::FunctionCall { function_call } = part else {
            return true;
        };
        // Calls without a wire id can only be matched by name
        let matched = answered
            .iter()
            .position(|&(id, name)| match (id, function_call.id.as_deref()) {
                (Some(response_id), Some(call_id)) => response_id == call_id,
                (None, None) => name == function_call.name,
                _ => false,
            });
        matched.map(|i| answered.swap_remove(i)).is_some()
    });

    let dropped = before - last.parts.len();
    if dropped > 0 {
        tracing::debug!(dropped, "Dropped unanswered function calls from history");
    }
    if last.parts.is_empty() {
        history.pop();
    }
}

/// Decode one SSE payload into a fragment; chunks with nothing in them are skipped
pub(super) fn parse_chunk(data: &str) -> Result<Option<StreamFragment>, LlmError> {
    let chunk: GeminiStreamChunk = serde_json::from_str(data)
        .map_err(|e| LlmError::protocol(format!("Failed to parse stream chunk: {e} - data: {data}")))?;

    if let Some(err) = chunk.error {
        return Err(LlmError::server_error(format!("Stream error: {}", err.message)));
    }

    let Some(candidate) = chunk.candidates.into_iter().next() else {
        return Ok(None);
    };
    let Some(content) = candidate.content else {
        return Ok(None);
    };

    let mut text = String::new();
    let mut function_calls = Vec::new();
    for part in content.parts {
        match part {
            GeminiPart::Text { text: t } => text.push_str(&t),
            GeminiPart::FunctionCall { function_call } => {
                let id = function_call
                    .id
                    .unwrap_or_else(|| format!("{LOCAL_CALL_PREFIX}{}", uuid::Uuid::new_v4()));
                function_calls.push(ToolCall::new(id, function_call.name, function_call.args));
            }
            GeminiPart::FunctionResponse { .. } | GeminiPart::Other(_) => {}
        }
    }

    if text.is_empty() && function_calls.is_empty() {
        return Ok(None);
    }
    Ok(Some(StreamFragment {
        text: (!text.is_empty()).then_some(text),
        function_calls,
    }))
}

/// Passes fragments through while collecting the model's side of the
/// exchange, committing both sides to history on clean exhaustion.
struct RecordingStream {
    inner: FragmentStream,
    history: Arc<Mutex<Vec<GeminiContent>>>,
    outbound: Option<GeminiContent>,
    reply_text: String,
    reply_calls: Vec<GeminiPart>,
    failed: bool,
}

impl RecordingStream {
    fn new(
        inner: FragmentStream,
        history: Arc<Mutex<Vec<GeminiContent>>>,
        outbound: GeminiContent,
    ) -> Self {
        Self {
            inner,
            history,
            outbound: Some(outbound),
            reply_text: String::new(),
            reply_calls: Vec::new(),
            failed: false,
        }
    }

    fn record(&mut self, fragment: &StreamFragment) {
        if let Some(text) = &fragment.text {
            self.reply_text.push_str(text);
        }
        for call in &fragment.function_calls {
            self.reply_calls.push(GeminiPart::FunctionCall {
                function_call: GeminiFunctionCall {
                    id: wire_call_id(&call.id),
                    name: call.name.clone(),
                    args: call.args.clone(),
                },
            });
        }
    }

    fn commit(&mut self) {
        let Some(outbound) = self.outbound.take() else {
            return;
        };
        if self.failed {
            return;
        }

        let mut parts = Vec::new();
        if !self.reply_text.is_empty() {
            parts.push(GeminiPart::Text {
                text: std::mem::take(&mut self.reply_text),
            });
        }
        parts.append(&mut self.reply_calls);

        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history.push(outbound);
        if !parts.is_empty() {
            history.push(GeminiContent {
                role: Some("model".to_string()),
                parts,
            });
        }
    }
}

impl Stream for RecordingStream {
    type Item = Result<StreamFragment, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(fragment))) => {
                this.record(&fragment);
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.failed = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.commit();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    /// Inline data, thought signatures and anything else we don't render
    #[serde(skip_serializing)]
    Other(Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
