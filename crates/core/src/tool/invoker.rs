use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use tracing::Instrument;

use crate::tool::{Error, Registry, ToolResult};

/// The outcome of a tool call, as reported back to the model.
///
/// It serializes to `{"ok": true, "tool": .., "data": ..}` on success and
/// `{"ok": false, "tool": .., "error": ..}` on failure.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutcome {
    /// Name of the tool that was requested.
    pub tool: String,
    /// The produced data or the failure.
    pub result: ToolResult,
}

impl ToolOutcome {
    /// Returns `true` if the tool call succeeded.
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Serializes the outcome into the content of a tool message.
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            // Only reachable with non-string map keys in `data`.
            let fallback = ToolOutcome {
                tool: self.tool.clone(),
                result: Err(Error::execution_error().with_reason(format!(
                    "Failed to serialize tool result: {err}"
                ))),
            };
            serde_json::to_string(&fallback).unwrap_or_default()
        })
    }
}

impl Serialize for ToolOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ToolOutcome", 3)?;
        state.serialize_field("ok", &self.result.is_ok())?;
        state.serialize_field("tool", &self.tool)?;
        match &self.result {
            Ok(data) => state.serialize_field("data", data)?,
            Err(err) => state.serialize_field("error", &err.reason())?,
        }
        state.end()
    }
}

/// Validates and executes tool calls against a [`Registry`].
///
/// Every failure is captured in the returned [`ToolOutcome`], so invoking
/// a tool never aborts the caller.
pub struct Invoker {
    registry: Registry,
}

impl Invoker {
    /// Creates an invoker over the given registry.
    #[inline]
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Returns the underlying registry.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Invokes the tool named `name` with raw `arguments`.
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolOutcome {
        let Some(tool) = self.registry.get(name) else {
            warn!("tool not found: {name}");
            return ToolOutcome {
                tool: name.to_owned(),
                result: Err(Error::unknown_tool(name)),
            };
        };

        trace!("invoking tool ({name}) with args: {arguments:?}");
        // Building the future runs input validation, keep it inside the
        // guarded block so a panic there is caught as well.
        let guarded = AssertUnwindSafe(async move { tool.execute(arguments).await })
            .catch_unwind()
            .instrument(debug_span!("tool execute", tool = name));
        let result = match guarded.await {
            Ok(result) => result,
            Err(payload) => {
                error!("tool ({name}) panicked");
                Err(Error::execution_error().with_reason(panic_message(payload)))
            }
        };

        if let Err(err) = &result {
            debug!("tool ({name}) failed: {err}");
        }
        ToolOutcome {
            tool: name.to_owned(),
            result,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "Failed to run tool (unknown error)".to_owned()
}
