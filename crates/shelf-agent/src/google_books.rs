//! A minimal client for the Google Books volumes API.

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";

/// Builder for [`GoogleBooksConfig`].
#[derive(Clone, Default, PartialEq)]
pub struct GoogleBooksConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
}

impl GoogleBooksConfigBuilder {
    /// Creates a builder without an API key.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key sent as the `key` query parameter.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets a custom base URL. Trailing slashes are ignored.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> GoogleBooksConfig {
        let base_url = self
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_owned();
        GoogleBooksConfig {
            api_key: self.api_key.filter(|key| !key.is_empty()),
            base_url,
        }
    }
}

impl Debug for GoogleBooksConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleBooksConfigBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Configuration for [`GoogleBooksClient`].
#[derive(Clone, PartialEq)]
pub struct GoogleBooksConfig {
    api_key: Option<String>,
    base_url: String,
}

impl GoogleBooksConfig {
    /// Returns the base URL without trailing slashes.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns `true` if requests are sent with an API key.
    #[inline]
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for GoogleBooksConfig {
    #[inline]
    fn default() -> Self {
        GoogleBooksConfigBuilder::new().build()
    }
}

impl Debug for GoogleBooksConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleBooksConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Parameters of a volume search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumesQuery {
    /// Free-text query.
    pub query: String,
    /// Maximum number of volumes to return.
    pub max_results: u32,
    /// Two-letter language code, or `None` to search every language.
    pub lang_restrict: Option<String>,
}

/// A page of volumes returned by the API.
///
/// Every field is optional on the wire. A `totalItems` that is not a
/// number is read as unknown, and entries of `items` that are not objects
/// carrying a string `id` are skipped.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesResponse {
    /// Total number of matches reported by the API.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_items: Option<u64>,
    /// The returned volumes.
    #[serde(default, deserialize_with = "lenient_volumes")]
    pub items: Option<Vec<Volume>>,
}

impl VolumesResponse {
    /// Returns the volumes of this page, empty if the API sent none.
    #[inline]
    pub fn volumes(&self) -> &[Volume] {
        self.items.as_deref().unwrap_or_default()
    }
}

/// A single volume.
///
/// `volume_info` is kept as raw JSON, its shape is up to the normalizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Volume {
    /// Volume id assigned by Google.
    pub id: String,
    /// Raw volume metadata.
    pub volume_info: Value,
}

impl Volume {
    /// Reads a volume from one entry of `items`.
    ///
    /// Returns `None` unless the entry is an object with a string `id`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };
        let Some(Value::String(id)) = object.remove("id") else {
            return None;
        };
        let volume_info = object.remove("volumeInfo").unwrap_or_default();
        Some(Self { id, volume_info })
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(count) => count.as_u64(),
        Value::String(count) => count.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_volumes<'de, D>(deserializer: D) -> Result<Option<Vec<Volume>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let volumes: Vec<_> = items.into_iter().filter_map(Volume::from_value).collect();
    Ok(Some(volumes))
}

/// Error type for [`GoogleBooksClient`].
#[derive(Debug)]
pub struct Error {
    message: String,
    status: Option<StatusCode>,
}

impl Error {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the API answered with a failure.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

/// Google Books API client.
///
/// Cloning is cheap, clones share the connection pool.
#[derive(Clone, Debug)]
pub struct GoogleBooksClient {
    client: Client,
    config: Arc<GoogleBooksConfig>,
}

impl GoogleBooksClient {
    /// Creates a client with the given configuration.
    #[inline]
    pub fn new(config: GoogleBooksConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Searches printed books ordered by relevance.
    pub async fn search_volumes(
        &self,
        query: &VolumesQuery,
    ) -> Result<VolumesResponse, Error> {
        let url = self.volumes_url(query)?;
        trace!("searching volumes: {query:?}");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| Error::new(format!("{err}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("volumes endpoint returned {status}");
            return Err(status_error(status, &body));
        }

        let body = resp
            .text()
            .await
            .map_err(|err| Error::new(format!("{err}")))?;
        let page: VolumesResponse = serde_json::from_str(&body).map_err(|err| {
            Error::new(format!("Failed to parse Google Books response: {err}"))
        })?;
        debug!(
            "got {} volumes (total {:?})",
            page.volumes().len(),
            page.total_items
        );
        Ok(page)
    }

    fn volumes_url(&self, query: &VolumesQuery) -> Result<Url, Error> {
        let mut url = Url::parse(&format!("{}/volumes", self.config.base_url))
            .map_err(|err| Error::new(format!("Invalid Google Books URL: {err}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query.query)
                .append_pair("printType", "books")
                .append_pair("orderBy", "relevance")
                .append_pair("maxResults", &query.max_results.to_string());
            if let Some(lang) = query.lang_restrict.as_deref() {
                pairs.append_pair("langRestrict", lang);
            }
            if let Some(key) = self.config.api_key.as_deref() {
                pairs.append_pair("key", key);
            }
        }
        Ok(url)
    }
}

fn status_error(status: StatusCode, body: &str) -> Error {
    let mut message = format!(
        "Google Books API error: {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    if !body.is_empty() {
        message.push_str(" - ");
        message.push_str(body);
    }
    Error {
        message,
        status: Some(status),
    }
}
