use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// Whether the model may call the tools.
    pub tool_choice: ToolChoice,
    /// Sampling temperature, `None` lets the provider pick its default.
    pub temperature: Option<f32>,
}

impl ModelRequest {
    /// Creates a request with the given messages and no tools.
    #[inline]
    pub fn with_messages(messages: impl Into<Vec<ModelMessage>>) -> Self {
        Self {
            messages: messages.into(),
            tools: vec![],
            tool_choice: ToolChoice::default(),
            temperature: None,
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A message produced by the assistant.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates a text-only assistant message.
    #[inline]
    pub fn assistant_text<S: Into<String>>(content: S) -> Self {
        Self::Assistant(AssistantMessage {
            content: Some(content.into()),
            tool_calls: vec![],
        })
    }
}

/// A message produced by the assistant.
///
/// When the assistant requests tool calls, `content` may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AssistantMessage {
    /// The text content, if any.
    pub content: Option<String>,
    /// Tool calls requested in this message, in the order they were emitted.
    pub tool_calls: Vec<ToolCallRequest>,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// Controls whether the model may respond with tool calls.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model decides between answering directly and calling tools.
    #[default]
    Auto,
    /// The model must answer with text only.
    None,
}
