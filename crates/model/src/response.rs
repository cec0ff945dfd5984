use serde::{Deserialize, Serialize};

use crate::AssistantMessage;

/// The reason why a model response has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model needs to call a tool.
    ToolCalls,
    /// The model has finished generating text.
    Stop,
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The serialized arguments, exactly as the model produced them.
    ///
    /// There is no guarantee that this is valid JSON.
    pub arguments: String,
}

/// A complete response from the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModelResponse {
    /// The text content of the message, if any.
    pub content: Option<String>,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

impl ModelResponse {
    /// Creates a text-only response.
    #[inline]
    pub fn with_text<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: Some(ModelFinishReason::Stop),
        }
    }

    /// Returns the final text if the response is a non-blank answer.
    #[inline]
    pub fn final_text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
    }

    /// Converts the response into a message for the conversation history.
    #[inline]
    pub fn into_message(self) -> AssistantMessage {
        AssistantMessage {
            content: self.content,
            tool_calls: self.tool_calls,
        }
    }
}
