use serde::{Deserialize, Serialize};
use shelf_agent_model::{ModelFinishReason, ModelResponse, ToolCallRequest};

/// The preset response for an assistant step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Text content of the response.
    pub content: Option<String>,
    /// Tool calls in this response.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a text-only `PresetResponse`.
    #[inline]
    pub fn with_text<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Creates a `PresetResponse` requesting the specified tool calls.
    #[inline]
    pub fn with_tool_calls(
        tool_calls: impl Into<Vec<ToolCallRequest>>,
    ) -> Self {
        Self {
            tool_calls: tool_calls.into(),
            ..Default::default()
        }
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    pub(crate) fn to_response(&self) -> ModelResponse {
        let finish_reason = if self.tool_calls.is_empty() {
            ModelFinishReason::Stop
        } else {
            ModelFinishReason::ToolCalls
        };
        ModelResponse {
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            finish_reason: Some(finish_reason),
        }
    }
}

/// Shorthand for building a [`ToolCallRequest`].
#[inline]
pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_owned(),
        name: name.to_owned(),
        arguments: arguments.to_owned(),
    }
}
