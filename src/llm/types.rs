//! Common types for model session interactions

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Argument object keyed by parameter name
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// Fetch a string argument by name
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }
}

/// One incremental unit of a streamed model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamFragment {
    pub text: Option<String>,
    pub function_calls: Vec<ToolCall>,
}

impl StreamFragment {
    /// Text carried by this fragment, if any is non-empty
    pub fn visible_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
impl StreamFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            function_calls: Vec::new(),
        }
    }

    pub fn call(call: ToolCall) -> Self {
        Self {
            text: None,
            function_calls: vec![call],
        }
    }
}

/// Result of a tool invocation sent back into the session
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    /// Structured payload; always a JSON object, never a serialized string
    pub response: Value,
}

/// What the host sends into the session to start a reply stream
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Message(String),
    ToolResponse(Vec<FunctionResponse>),
}

impl SessionInput {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionInput::Message(_) => "message",
            SessionInput::ToolResponse(_) => "tool_response",
        }
    }
}

/// Tool definition registered with the session
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Fixed configuration a session is created with
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub system_instruction: String,
    pub tools: Vec<ToolDefinition>,
}
