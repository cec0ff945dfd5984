use std::error::Error as StdError;
use std::fmt::{self, Display};

use shelf_agent_model::{ErrorKind, ModelProviderError};

use crate::tool::DuplicateToolError;

/// Errors that end an agent turn, or prevent an agent from being built.
#[derive(Debug)]
pub enum Error {
    /// The model answered without tool calls and without any text.
    EmptyResponse,
    /// The model kept requesting tools until the step budget ran out.
    StepBudgetExceeded(usize),
    /// Two tools were registered under the same name.
    DuplicateTool(DuplicateToolError),
    /// The completion endpoint failed.
    Model(Box<dyn ModelProviderError>),
}

impl Error {
    /// Returns the kind of the model error, if this error comes from the
    /// completion endpoint.
    #[inline]
    pub fn model_error_kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Model(err) => Some(err.kind()),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyResponse => write!(f, "LLM returned empty content"),
            Error::StepBudgetExceeded(steps) => {
                write!(f, "Agent exceeded max steps ({steps})")
            }
            Error::DuplicateTool(err) => Display::fmt(err, f),
            Error::Model(err) => Display::fmt(err, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::DuplicateTool(err) => Some(err),
            Error::Model(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<DuplicateToolError> for Error {
    #[inline]
    fn from(err: DuplicateToolError) -> Self {
        Error::DuplicateTool(err)
    }
}

impl From<Box<dyn ModelProviderError>> for Error {
    #[inline]
    fn from(err: Box<dyn ModelProviderError>) -> Self {
        Error::Model(err)
    }
}
