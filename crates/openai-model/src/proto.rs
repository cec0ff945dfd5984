use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use shelf_agent_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ModelResponse, ModelTool,
    ToolCallRequest, ToolChoice,
};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: FunctionToolCall,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    temperature: f32,
}

// -----------
// Conversions
// -----------

fn function_type() -> String {
    "function".to_owned()
}

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    let tools: Vec<Tool> = req.tools.iter().map(create_tool).collect();
    // `tool_choice` is only meaningful when tools are attached.
    let tool_choice = (!tools.is_empty()).then_some(req.tool_choice);
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools,
        tool_choice,
        temperature: req.temperature.unwrap_or(config.default_temperature),
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(assistant) => Message::Assistant {
            content: assistant.content.clone(),
            tool_calls: if assistant.tool_calls.is_empty() {
                None
            } else {
                Some(
                    assistant
                        .tool_calls
                        .iter()
                        .map(|call| ToolCall {
                            id: call.id.clone(),
                            r#type: function_type(),
                            function: FunctionToolCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect(),
                )
            },
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// The outcome of reading the first choice of a completion.
pub enum ParsedChoice {
    Response(ModelResponse),
    Moderated,
    Empty,
}

pub fn parse_completion(completion: ChatCompletion) -> ParsedChoice {
    let Some(choice) = completion.choices.into_iter().next() else {
        return ParsedChoice::Empty;
    };

    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => Some(ModelFinishReason::ToolCalls),
        Some("content_filter")
            if tool_calls.is_empty() && choice.message.content.is_none() =>
        {
            return ParsedChoice::Moderated;
        }
        Some(_) => Some(ModelFinishReason::Stop),
        None => None,
    };

    ParsedChoice::Response(ModelResponse {
        content: choice.message.content,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shelf_agent_model::{AssistantMessage, ToolCallResult};

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let mut request = ModelRequest::with_messages([
            ModelMessage::System("You recommend books.".to_owned()),
            ModelMessage::User("統計学を学びたい".to_owned()),
        ]);
        request.tools.push(ModelTool {
            name: "searchBooks".to_owned(),
            description: "Searches books.".to_owned(),
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } }
            }),
        });
        let config = OpenAIConfigBuilder::with_api_key("xxx")
            .with_model("custom")
            .build();
        let expected = ChatCompletionRequest {
            model: "custom".to_owned(),
            messages: vec![
                Message::System {
                    content: "You recommend books.".to_owned(),
                },
                Message::User {
                    content: "統計学を学びたい".to_owned(),
                },
            ],
            tools: vec![Tool {
                r#type: "function",
                function: FunctionTool {
                    name: "searchBooks".to_owned(),
                    description: "Searches books.".to_owned(),
                    parameters: json!({
                        "type": "object",
                        "properties": { "query": { "type": "string" } }
                    }),
                },
            }],
            tool_choice: Some(ToolChoice::Auto),
            temperature: 0.4,
        };
        assert_eq!(create_request(&request, &config), expected);
    }

    #[test]
    fn test_serialize_tool_history() {
        let mut request = ModelRequest::with_messages([
            ModelMessage::Assistant(AssistantMessage {
                content: None,
                tool_calls: vec![ToolCallRequest {
                    id: "call_1".to_owned(),
                    name: "searchBooks".to_owned(),
                    arguments: r#"{"query":"rust"}"#.to_owned(),
                }],
            }),
            ModelMessage::Tool(ToolCallResult {
                id: "call_1".to_owned(),
                content: r#"{"ok":true}"#.to_owned(),
            }),
        ]);
        request.temperature = Some(0.0);
        let config = OpenAIConfigBuilder::with_api_key("xxx").build();

        let value =
            serde_json::to_value(create_request(&request, &config)).unwrap();
        assert_eq!(
            value,
            json!({
                "model": "gpt-4.1-mini",
                "messages": [
                    {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "searchBooks",
                                "arguments": "{\"query\":\"rust\"}"
                            }
                        }]
                    },
                    {
                        "role": "tool",
                        "tool_call_id": "call_1",
                        "content": "{\"ok\":true}"
                    }
                ],
                "temperature": 0.0
            })
        );
    }

    #[test]
    fn test_parse_tool_calls() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {
                            "id": "call_a",
                            "type": "function",
                            "function": { "name": "searchBooks", "arguments": "{\"query\":\"a\"}" }
                        },
                        {
                            "id": "call_b",
                            "type": "function",
                            "function": { "name": "searchBooks", "arguments": "not json" }
                        }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let ParsedChoice::Response(resp) = parse_completion(completion) else {
            panic!("expected a response");
        };
        assert_eq!(resp.content, None);
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::ToolCalls));
        let ids: Vec<_> = resp.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["call_a", "call_b"]);
        assert_eq!(resp.tool_calls[1].arguments, "not json");
    }

    #[test]
    fn test_parse_empty_and_moderated() {
        let completion: ChatCompletion =
            serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(parse_completion(completion), ParsedChoice::Empty));

        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [{
                "message": { "role": "assistant", "content": null },
                "finish_reason": "content_filter"
            }]
        }))
        .unwrap();
        assert!(matches!(parse_completion(completion), ParsedChoice::Moderated));
    }

    #[test]
    fn test_parse_null_arguments() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_a",
                        "type": "function",
                        "function": { "name": "searchBooks", "arguments": null }
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();

        let ParsedChoice::Response(resp) = parse_completion(completion) else {
            panic!("expected a response");
        };
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "searchBooks");
        assert_eq!(resp.tool_calls[0].arguments, "");
    }
}
