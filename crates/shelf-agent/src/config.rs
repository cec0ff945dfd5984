//! Environment based configuration.

use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Display};

use shelf_agent_openai_model::{OpenAIConfig, OpenAIConfigBuilder};

use crate::google_books::{GoogleBooksConfig, GoogleBooksConfigBuilder};

const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const OPENAI_MODEL: &str = "OPENAI_MODEL";
const GOOGLE_BOOKS_API_KEY: &str = "GOOGLE_BOOKS_API_KEY";
const GOOGLE_BOOKS_BASE_URL: &str = "GOOGLE_BOOKS_BASE_URL";

/// Error returned when the configuration is incomplete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    MissingVar(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingVar(name) => {
                write!(f, "{name} environment variable is not set")
            }
        }
    }
}

impl StdError for ConfigError {}

/// Settings of the completion endpoint and the book catalog.
///
/// | variable | |
/// |---|---|
/// | `OPENAI_API_KEY` | required |
/// | `OPENAI_BASE_URL` | defaults to `https://api.openai.com/v1` |
/// | `OPENAI_MODEL` | defaults to `gpt-4.1-mini` |
/// | `GOOGLE_BOOKS_API_KEY` | optional |
/// | `GOOGLE_BOOKS_BASE_URL` | defaults to `https://www.googleapis.com/books/v1` |
///
/// Empty values count as unset.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Completion endpoint settings.
    pub openai: OpenAIConfig,
    /// Google Books settings.
    pub google_books: GoogleBooksConfig,
}

impl Settings {
    /// Reads the settings from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = var(OPENAI_API_KEY).ok_or(ConfigError::MissingVar(OPENAI_API_KEY))?;
        let mut openai = OpenAIConfigBuilder::with_api_key(api_key);
        if let Some(base_url) = var(OPENAI_BASE_URL) {
            openai = openai.with_base_url(base_url);
        }
        if let Some(model) = var(OPENAI_MODEL) {
            openai = openai.with_model(model);
        }

        let mut google_books = GoogleBooksConfigBuilder::new();
        if let Some(api_key) = var(GOOGLE_BOOKS_API_KEY) {
            google_books = google_books.with_api_key(api_key);
        }
        if let Some(base_url) = var(GOOGLE_BOOKS_BASE_URL) {
            google_books = google_books.with_base_url(base_url);
        }

        Ok(Self {
            openai: openai.build(),
            google_books: google_books.build(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_missing_api_key() {
        let err = settings(&[]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("OPENAI_API_KEY"));
        assert_eq!(err.to_string(), "OPENAI_API_KEY environment variable is not set");

        let err = settings(&[("OPENAI_API_KEY", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("OPENAI_API_KEY"));
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(settings.openai.model(), "gpt-4.1-mini");
        assert_eq!(settings.openai.base_url(), "https://api.openai.com/v1");
        assert_eq!(
            settings.google_books.base_url(),
            "https://www.googleapis.com/books/v1"
        );
        assert!(!settings.google_books.has_api_key());
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1//"),
            ("OPENAI_MODEL", "gpt-4o"),
            ("GOOGLE_BOOKS_API_KEY", "books-key"),
            ("GOOGLE_BOOKS_BASE_URL", "http://localhost:9090/"),
            ("OPENAI_UNRELATED", "ignored"),
        ])
        .unwrap();
        assert_eq!(settings.openai.model(), "gpt-4o");
        assert_eq!(settings.openai.base_url(), "http://localhost:8080/v1");
        assert_eq!(settings.google_books.base_url(), "http://localhost:9090");
        assert!(settings.google_books.has_api_key());

        let debug = format!("{settings:?}");
        assert!(!debug.contains("sk-test"));
        assert!(!debug.contains("books-key"));
    }
}
