mod builder;
mod error;
mod state;

use backoff::ExponentialBackoff;
use serde_json::{Map, Value};
use shelf_agent_model::{
    ErrorKind, ModelMessage, ModelRequest, ModelResponse, ToolCallRequest,
    ToolCallResult, ToolChoice,
};
use tracing::Instrument;

use crate::conversation::Conversation;
use crate::model_client::{ModelClient, SendRequestResult};
use crate::tool::Invoker;
pub use builder::AgentBuilder;
pub use error::Error;
use state::AgentStage;

/// How many completion requests a turn may issue by default.
pub const DEFAULT_MAX_STEPS: usize = 6;

/// An agent that answers a conversation, calling tools on the model's behalf.
///
/// The agent holds no per-conversation state. Each call to [`run`](Self::run)
/// builds its own history from the messages it is given, so one agent can
/// serve any number of independent turns, concurrently or not.
pub struct Agent {
    model_client: ModelClient,
    invoker: Invoker,
    system_prompt: Option<String>,
    max_steps: usize,
    temperature: Option<f32>,
    retry_policy: Option<ExponentialBackoff>,
    on_tool_call: Option<Box<dyn Fn(&ToolCallRequest) + Send + Sync>>,
}

impl Agent {
    /// Runs one turn over `messages` and returns the final answer.
    ///
    /// The history starts with the system prompt followed by `messages`.
    /// Tool calls are executed one at a time, in the order the model
    /// requested them, and all of their results are recorded before the
    /// next completion request.
    pub async fn run<I>(&self, messages: I) -> Result<String, Error>
    where
        I: IntoIterator<Item = ModelMessage>,
    {
        let mut conversation = Conversation::default();
        if let Some(prompt) = &self.system_prompt {
            conversation.push(ModelMessage::System(prompt.clone()));
        }
        conversation.extend(messages);

        let mut stage = AgentStage::default();
        let result = self
            .run_steps(&mut conversation, &mut stage)
            .instrument(debug_span!("agent turn"))
            .await;
        stage.advance(if result.is_ok() {
            AgentStage::Finished
        } else {
            AgentStage::Failed
        });
        debug!("turn {stage} with {} messages", conversation.len());
        result
    }

    async fn run_steps(
        &self,
        conversation: &mut Conversation,
        stage: &mut AgentStage,
    ) -> Result<String, Error> {
        let tools = self.invoker.registry().definitions();

        for step in 0..self.max_steps {
            debug!("step {}/{}", step + 1, self.max_steps);
            let request = ModelRequest {
                messages: conversation.messages().to_vec(),
                tools: tools.clone(),
                tool_choice: ToolChoice::Auto,
                temperature: self.temperature,
            };
            let response = self.request_completion(request).await?;

            if response.tool_calls.is_empty() {
                return match response.final_text() {
                    Some(_) => Ok(response.content.unwrap_or_default()),
                    None => Err(Error::EmptyResponse),
                };
            }

            stage.advance(AgentStage::ExecutingTools);
            let message = response.into_message();
            let tool_calls = message.tool_calls.clone();
            conversation.push(ModelMessage::Assistant(message));

            for call in tool_calls {
                if let Some(on_tool_call) = &self.on_tool_call {
                    on_tool_call(&call);
                }
                let arguments = parse_arguments(&call.arguments);
                let outcome = self.invoker.invoke(&call.name, arguments).await;
                conversation.push(ModelMessage::Tool(ToolCallResult {
                    id: call.id,
                    content: outcome.to_content(),
                }));
            }
            stage.advance(AgentStage::AwaitingCompletion);
        }

        warn!("agent exceeded {} steps", self.max_steps);
        Err(Error::StepBudgetExceeded(self.max_steps))
    }

    async fn request_completion(
        &self,
        request: ModelRequest,
    ) -> Result<ModelResponse, Error> {
        let Some(policy) = self.retry_policy.clone() else {
            return Ok(self.model_client.send_request(request).await?);
        };

        let result: SendRequestResult = backoff::future::retry(policy, || {
            let request = request.clone();
            async move {
                self.model_client.send_request(request).await.map_err(|err| {
                    if err.kind() == ErrorKind::RateLimitExceeded {
                        warn!("completion rate limited, retrying: {err}");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await;
        Ok(result?)
    }
}

/// Parses the raw arguments of a tool call.
///
/// Missing or malformed arguments are treated as an empty object, leaving
/// it to the tool's input validation to report what is missing.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        debug!("malformed tool arguments ({err}): {raw}");
        Value::Object(Map::new())
    })
}
