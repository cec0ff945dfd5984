//! Request and response shapes of a chat endpoint.
//!
//! These types carry no transport. A host (the bundled CLI or an HTTP
//! handler) deserializes a [`ChatRequest`], hands it to
//! [`Session::reply`](crate::Session::reply) and serializes the
//! [`ChatReply`] or [`ChatError::to_body`].

use std::error::Error as StdError;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shelf_agent_model::ModelMessage;

/// Maximum number of messages in a request.
pub const MAX_MESSAGES: usize = 50;
/// Maximum number of characters in a single message.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human side.
    User,
    /// The agent side.
    Assistant,
}

/// A message of the chat transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: ChatRole,
    /// Text of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<ChatMessage> for ModelMessage {
    fn from(message: ChatMessage) -> Self {
        match message.role {
            ChatRole::User => ModelMessage::User(message.content),
            ChatRole::Assistant => ModelMessage::assistant_text(message.content),
        }
    }
}

/// Drops the oldest messages until at most `max` remain.
///
/// The kept transcript always starts at a user message, so an exchange is
/// never cut between its question and its answer.
pub fn trim_transcript(messages: &mut Vec<ChatMessage>, max: usize) {
    let excess = messages.len().saturating_sub(max);
    let start = messages[excess..]
        .iter()
        .position(|message| message.role == ChatRole::User)
        .map_or(messages.len(), |offset| excess + offset);
    messages.drain(..start);
}

/// The whole transcript sent with every turn.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Messages in chronological order.
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Checks the size limits of the request.
    ///
    /// All violations are reported, not just the first one.
    pub fn validate(&self) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        if self.messages.is_empty() {
            violations.push(Violation::new(
                "messages",
                "Array must contain at least 1 element(s)",
            ));
        } else if self.messages.len() > MAX_MESSAGES {
            violations.push(Violation::new(
                "messages",
                format!("Array must contain at most {MAX_MESSAGES} element(s)"),
            ));
        }

        for (idx, message) in self.messages.iter().enumerate() {
            let chars = message.content.chars().count();
            let path = format!("messages.{idx}.content");
            if chars == 0 {
                violations.push(Violation::new(
                    path,
                    "String must contain at least 1 character(s)",
                ));
            } else if chars > MAX_CONTENT_CHARS {
                violations.push(Violation::new(
                    path,
                    format!(
                        "String must contain at most {MAX_CONTENT_CHARS} character(s)"
                    ),
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// A single reason a [`ChatRequest`] was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path of the offending field.
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A successful turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The agent's answer.
    pub reply: String,
}

/// A failed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatError {
    /// The request broke the size limits. This is the caller's fault.
    InvalidRequest(Vec<Violation>),
    /// The agent could not produce an answer.
    Agent(String),
}

impl ChatError {
    /// Returns `true` if the caller sent a bad request.
    #[inline]
    pub fn is_client_error(&self) -> bool {
        matches!(self, ChatError::InvalidRequest(_))
    }

    /// Builds the JSON error body: `{"error": .., "details": [..]}`, where
    /// `details` is only present for invalid requests.
    pub fn to_body(&self) -> Value {
        match self {
            ChatError::InvalidRequest(violations) => json!({
                "error": self.to_string(),
                "details": violations,
            }),
            ChatError::Agent(_) => json!({ "error": self.to_string() }),
        }
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::InvalidRequest(_) => write!(f, "Invalid request"),
            ChatError::Agent(message) => write!(f, "{message}"),
        }
    }
}

impl StdError for ChatError {}
