use backoff::ExponentialBackoff;
use shelf_agent_model::{ModelProvider, ToolCallRequest};

use super::{Agent, DEFAULT_MAX_STEPS, Error};
use crate::model_client::ModelClient;
use crate::tool::{DuplicateToolError, Invoker, Registry, Tool};

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    system_prompt: Option<String>,
    registry: Registry,
    duplicate: Option<DuplicateToolError>,
    max_steps: usize,
    temperature: Option<f32>,
    retry_policy: Option<ExponentialBackoff>,
    on_tool_call: Option<Box<dyn Fn(&ToolCallRequest) + Send + Sync>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            registry: Registry::default(),
            duplicate: None,
            max_steps: DEFAULT_MAX_STEPS,
            temperature: None,
            retry_policy: None,
            on_tool_call: None,
        }
    }

    /// Sets the system prompt that starts every turn.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    ///
    /// Registering two tools with the same name makes [`build`](Self::build)
    /// fail.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        if let Err(err) = self.registry.add_tool(tool) {
            self.duplicate.get_or_insert(err);
        }
        self
    }

    /// Sets how many completion requests a single turn may issue.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the sampling temperature sent with every request.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Retries rate-limited completion requests with the given policy.
    ///
    /// Without a policy, which is the default, any endpoint failure ends
    /// the turn immediately.
    #[inline]
    pub fn with_retry_policy(mut self, policy: ExponentialBackoff) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Attaches a callback to be invoked right before a tool is executed.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolCallRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_tool_call = Some(Box::new(on_tool_call));
        self
    }

    /// Builds the agent.
    pub fn build(self) -> Result<Agent, Error> {
        if let Some(err) = self.duplicate {
            return Err(err.into());
        }
        Ok(Agent {
            model_client: self.model_client,
            invoker: Invoker::new(self.registry),
            system_prompt: self.system_prompt,
            max_steps: self.max_steps,
            temperature: self.temperature,
            retry_policy: self.retry_policy,
            on_tool_call: self.on_tool_call,
        })
    }
}
