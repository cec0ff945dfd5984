use schemars::{JsonSchema, schema_for};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};
use shelf_agent_core::tool::{Error as ToolError, Tool, ToolResult};

use crate::google_books::{GoogleBooksClient, VolumesQuery};
use crate::tools::normalize::{BookCandidate, merge_candidates, normalize_volumes};

/// Fewer language-matched results than this (or `maxResults`, if smaller)
/// triggers an unrestricted second search.
const FALLBACK_THRESHOLD: u32 = 5;
const MAX_RESULTS_LIMIT: u32 = 40;

fn default_lang_restrict() -> String {
    "ja".to_owned()
}

fn default_max_results() -> u32 {
    10
}

/// Accepts any JSON number with no fractional part, so `7.0` reads as `7`.
///
/// Values outside `u32` saturate and are left to [`Tool::validate`].
fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    if let Some(count) = number.as_u64() {
        return Ok(u32::try_from(count).unwrap_or(u32::MAX));
    }
    if number.as_i64().is_some() {
        return Ok(0);
    }
    match number.as_f64() {
        Some(count) if count.fract() == 0.0 => Ok(count.clamp(0.0, u32::MAX as f64) as u32),
        _ => Err(D::Error::custom("Expected integer, received float")),
    }
}

/// Input of [`SearchBooksTool`].
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchBooksParameters {
    #[schemars(
        description = "Search query: the topic or keywords the user wants to learn about.",
        length(min = 1)
    )]
    query: String,
    #[serde(default = "default_lang_restrict")]
    #[schemars(
        description = "Language restriction such as `ja` or `en`. Defaults to `ja`.",
        length(min = 2)
    )]
    lang_restrict: String,
    #[serde(default = "default_max_results", deserialize_with = "lenient_count")]
    #[schemars(
        description = "Number of books to fetch (1-40). Defaults to 10.",
        range(min = 1, max = 40)
    )]
    max_results: u32,
}

/// Output of [`SearchBooksTool`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchBooksOutput {
    /// Where the books came from, always `google_books`.
    pub source: &'static str,
    /// The candidates, language-matched ones first.
    pub books: Vec<BookCandidate>,
}

/// A tool for finding recommendation candidates on Google Books.
///
/// The search is restricted to the requested language first. When that
/// yields too few books, an unrestricted search tops the list up.
pub struct SearchBooksTool {
    client: GoogleBooksClient,
    parameter_schema: Value,
}

impl SearchBooksTool {
    /// Creates a new search tool backed by `client`.
    #[inline]
    pub fn new(client: GoogleBooksClient) -> Self {
        SearchBooksTool {
            client,
            parameter_schema: schema_for!(SearchBooksParameters).to_value(),
        }
    }
}

impl Tool for SearchBooksTool {
    type Input = SearchBooksParameters;
    type Output = SearchBooksOutput;

    fn name(&self) -> &str {
        "searchBooks"
    }

    fn description(&self) -> &str {
        r#"
Searches Google Books and returns recommendation candidates with title, authors,
description, categories, publication date, thumbnail, link and ISBNs."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn validate(&self, input: &SearchBooksParameters) -> ToolResult<()> {
        if input.query.chars().count() < 1 {
            return Err(invalid("query", "String must contain at least 1 character(s)"));
        }
        if input.lang_restrict.chars().count() < 2 {
            return Err(invalid(
                "langRestrict",
                "String must contain at least 2 character(s)",
            ));
        }
        if input.max_results < 1 {
            return Err(invalid(
                "maxResults",
                "Number must be greater than or equal to 1",
            ));
        }
        if input.max_results > MAX_RESULTS_LIMIT {
            return Err(invalid(
                "maxResults",
                "Number must be less than or equal to 40",
            ));
        }
        Ok(())
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SearchBooksParameters,
    ) -> impl Future<Output = ToolResult<SearchBooksOutput>> + Send + 'static {
        let client = self.client.clone();
        async move {
            let max_results = input.max_results;
            let mut query = VolumesQuery {
                query: input.query,
                max_results,
                lang_restrict: Some(input.lang_restrict),
            };

            let primary = client.search_volumes(&query).await.map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })?;
            let mut books = normalize_volumes(primary.volumes());

            let wanted = max_results.min(FALLBACK_THRESHOLD) as usize;
            if books.len() < wanted && query.lang_restrict.is_some() {
                debug!(
                    "only {} books for {:?}, searching all languages",
                    books.len(),
                    query.lang_restrict
                );
                query.lang_restrict = None;
                match client.search_volumes(&query).await {
                    Ok(fallback) => {
                        books = merge_candidates(
                            books,
                            normalize_volumes(fallback.volumes()),
                            max_results as usize,
                        );
                    }
                    Err(err) => {
                        warn!(
                            "fallback search failed, keeping {} books: {err}",
                            books.len()
                        );
                    }
                }
            }

            Ok(SearchBooksOutput {
                source: "google_books",
                books,
            })
        }
    }
}

#[inline]
fn invalid(field: &str, message: &str) -> ToolError {
    ToolError::invalid_input().with_reason(format!("{field}: {message}"))
}
