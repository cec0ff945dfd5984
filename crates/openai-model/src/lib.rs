//! A model provider for OpenAI-compatible chat completion APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use reqwest::{Client, StatusCode, header};
use shelf_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, ParsedChoice};

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        trace!("sending completion request: {openai_req:?}");
        let resp_fut = self
            .client
            .post(format!("{}{}", self.config.base_url, "/chat/completions"))
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                error!("completion endpoint returned {status}");
                return Err(status_error(status, &body));
            }

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_json = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON)
                })
                // Some compatible servers omit the header entirely.
                .unwrap_or(content_type.is_none());
            if !is_json {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            let completion: ChatCompletion = resp
                .json()
                .await
                .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;

            match proto::parse_completion(completion) {
                ParsedChoice::Response(resp) => Ok(resp),
                ParsedChoice::Empty => Err(Error::new(
                    "LLM returned no choices",
                    ErrorKind::Other,
                )),
                ParsedChoice::Moderated => Err(Error::new(
                    "LLM response was blocked by the content filter",
                    ErrorKind::Moderated,
                )),
            }
        }
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    let mut message = format!(
        "LLM API error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    if !body.is_empty() {
        message.push_str(" - ");
        message.push_str(body);
    }
    let kind = if status == StatusCode::TOO_MANY_REQUESTS {
        ErrorKind::RateLimitExceeded
    } else {
        ErrorKind::Other
    };
    Error::new(message, kind)
}
