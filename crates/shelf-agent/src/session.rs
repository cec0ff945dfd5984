use backoff::ExponentialBackoff;
use shelf_agent_core::{Agent, AgentBuilder, Error as AgentError};
use shelf_agent_model::{ModelMessage, ModelProvider, ToolCallRequest};
use shelf_agent_openai_model::OpenAIProvider;

use crate::chat::{ChatError, ChatReply, ChatRequest};
use crate::config::Settings;
use crate::google_books::{GoogleBooksClient, GoogleBooksConfig};
use crate::tools::SearchBooksTool;

/// The default system prompt of the recommendation agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    google_books: GoogleBooksConfig,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider)
            .with_system_prompt(DEFAULT_SYSTEM_PROMPT);
        Self {
            agent_builder,
            google_books: GoogleBooksConfig::default(),
        }
    }

    /// Creates a session builder talking to the endpoints in `settings`.
    pub fn from_settings(settings: Settings) -> Self {
        Self::with_model_provider(OpenAIProvider::new(settings.openai))
            .with_google_books(settings.google_books)
    }

    /// Sets the Google Books configuration used by the search tool.
    #[inline]
    pub fn with_google_books(mut self, config: GoogleBooksConfig) -> Self {
        self.google_books = config;
        self
    }

    /// Replaces the default system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets how many completion requests a single reply may issue.
    #[inline]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.agent_builder = self.agent_builder.with_max_steps(max_steps);
        self
    }

    /// Retries rate-limited completion requests with the given policy.
    #[inline]
    pub fn with_retry_policy(mut self, policy: ExponentialBackoff) -> Self {
        self.agent_builder = self.agent_builder.with_retry_policy(policy);
        self
    }

    /// Attaches a callback to be invoked when the agent calls a tool.
    #[inline]
    pub fn on_tool_call(
        mut self,
        on_tool_call: impl Fn(&ToolCallRequest) + Send + Sync + 'static,
    ) -> Self {
        self.agent_builder = self.agent_builder.on_tool_call(on_tool_call);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Result<Session, AgentError> {
        let client = GoogleBooksClient::new(self.google_books);
        let agent = self
            .agent_builder
            .with_tool(SearchBooksTool::new(client))
            .build()?;

        Ok(Session { agent })
    }
}

/// A recommendation session.
///
/// The session keeps no transcript of its own: every call to
/// [`reply`](Self::reply) receives the whole conversation so far. It is
/// basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Answers the last message of `request`.
    pub async fn reply(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        request.validate().map_err(|violations| {
            debug!("rejecting chat request: {violations:?}");
            ChatError::InvalidRequest(violations)
        })?;

        let messages = request.messages.into_iter().map(ModelMessage::from);
        match self.agent.run(messages).await {
            Ok(reply) => Ok(ChatReply { reply }),
            Err(err) => {
                error!("agent failed: {err}");
                Err(ChatError::Agent(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use shelf_agent_test_model::{PresetResponse, TestModelProvider, tool_call};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::chat::ChatMessage;
    use crate::google_books::GoogleBooksConfigBuilder;

    fn volumes(books: &[(&str, &str)]) -> Value {
        let items: Vec<_> = books
            .iter()
            .map(|(id, title)| json!({ "id": id, "volumeInfo": { "title": title } }))
            .collect();
        json!({ "totalItems": books.len(), "items": items })
    }

    fn session_for(server: &MockServer, provider: TestModelProvider) -> Session {
        let google_books = GoogleBooksConfigBuilder::new()
            .with_base_url(server.uri())
            .build();
        SessionBuilder::with_model_provider(provider)
            .with_google_books(google_books)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reply_with_fallback_search() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/volumes"))
            .and(query_param("langRestrict", "ja"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volumes(&[
                ("vol_ja", "統計学入門"),
                ("vol_dup", "統計的学習の基礎"),
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/volumes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volumes(&[
                ("vol_dup", "The Elements of Statistical Learning"),
                ("vol_fb", "Fallback Book"),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_tool_calls([tool_call(
            "call_1",
            "searchBooks",
            r#"{"query":"統計学","maxResults":7}"#,
        )]));
        provider.add_response(PresetResponse::with_text("おすすめの3冊です。"));

        let session = session_for(&server, provider.clone());
        let reply = session
            .reply(ChatRequest {
                messages: vec![ChatMessage::user("統計学を学びたい")],
            })
            .await
            .unwrap();
        assert_eq!(reply.reply, "おすすめの3冊です。");

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].messages[0],
            ModelMessage::System(DEFAULT_SYSTEM_PROMPT.to_owned())
        );
        assert_eq!(requests[0].tools[0].name, "searchBooks");

        let ModelMessage::Tool(result) = &requests[1].messages[3] else {
            panic!("expected the search result");
        };
        assert_eq!(result.id, "call_1");
        let content: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(content["ok"], json!(true));
        assert_eq!(content["tool"], json!("searchBooks"));
        assert_eq!(content["data"]["source"], json!("google_books"));
        let books = content["data"]["books"].as_array().unwrap();
        let titles: Vec<_> = books.iter().map(|b| b["title"].as_str().unwrap()).collect();
        assert_eq!(titles, ["統計学入門", "統計的学習の基礎", "Fallback Book"]);
        assert_eq!(books[2]["id"], json!("vol_fb"));
        assert_eq!(books[2]["thumbnail"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_reported_to_the_model() {
        let server = MockServer::start().await;
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_tool_calls([tool_call(
            "call_1",
            "searchBooks",
            r#"{"query":"","maxResults":100}"#,
        )]));
        provider.add_response(PresetResponse::with_text("検索語を教えてください。"));

        let session = session_for(&server, provider.clone());
        let reply = session
            .reply(ChatRequest {
                messages: vec![ChatMessage::user("本を教えて")],
            })
            .await
            .unwrap();
        assert_eq!(reply.reply, "検索語を教えてください。");

        let ModelMessage::Tool(result) = &provider.requests()[1].messages[3] else {
            panic!("expected the search result");
        };
        let content: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(content["ok"], json!(false));
        assert_eq!(
            content["error"],
            json!("query: String must contain at least 1 character(s)")
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_is_forwarded() {
        let server = MockServer::start().await;
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("了解です。"));

        let session = SessionBuilder::with_model_provider(provider.clone())
            .with_google_books(
                GoogleBooksConfigBuilder::new().with_base_url(server.uri()).build(),
            )
            .with_system_prompt("custom prompt")
            .build()
            .unwrap();
        session
            .reply(ChatRequest {
                messages: vec![
                    ChatMessage::user("統計学を学びたい"),
                    ChatMessage::assistant("レベルは？"),
                    ChatMessage::user("初心者です"),
                ],
            })
            .await
            .unwrap();

        assert_eq!(
            provider.requests()[0].messages,
            vec![
                ModelMessage::System("custom prompt".to_owned()),
                ModelMessage::User("統計学を学びたい".to_owned()),
                ModelMessage::assistant_text("レベルは？"),
                ModelMessage::User("初心者です".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn test_errors() {
        let server = MockServer::start().await;
        let provider = TestModelProvider::default();
        let session = session_for(&server, provider.clone());

        let err = session.reply(ChatRequest::default()).await.unwrap_err();
        assert!(err.is_client_error());
        assert!(provider.requests().is_empty());

        let err = session
            .reply(ChatRequest {
                messages: vec![ChatMessage::user("hi")],
            })
            .await
            .unwrap_err();
        assert!(!err.is_client_error());
        assert_eq!(err.to_body()["error"], json!("test model error: no enough steps"));
    }

    #[tokio::test]
    async fn test_empty_reply() {
        let server = MockServer::start().await;
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_text("   "));
        let session = session_for(&server, provider);

        let err = session
            .reply(ChatRequest {
                messages: vec![ChatMessage::user("hi")],
            })
            .await
            .unwrap_err();
        assert_eq!(err, ChatError::Agent("LLM returned empty content".to_owned()));
    }
}
