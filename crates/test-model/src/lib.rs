//! A local fake model for testing purpose.

mod preset;

use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex, MutexGuard};

use shelf_agent_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest, ModelResponse,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "test model error: {}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Default)]
struct Script {
    steps: Vec<PresetResponse>,
    cursor: usize,
    failed_attempts: u64,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to each request. Responses are handed out
/// in the order they were added, one per successful request. If there are no
/// enough steps in the script, an error will be returned.
///
/// Clones share the same script, so a test can keep a clone around to inspect
/// the recorded requests after handing the provider to an agent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock().steps.push(preset);
    }

    /// Returns every request received so far, including failed ones.
    #[inline]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock().requests.clone()
    }

    /// Returns the number of responses that have been handed out.
    #[inline]
    pub fn consumed_steps(&self) -> usize {
        self.lock().cursor
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // A panicking test thread may poison the lock, the script itself
        // is still usable.
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn next_response(&self, req: &ModelRequest) -> Result<ModelResponse, Error> {
        let mut script = self.lock();
        script.requests.push(req.clone());

        let Some(step) = script.steps.get(script.cursor).cloned() else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            });
        };

        match step.failures {
            Some(0) => {
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            Some(failures) if script.failed_attempts < failures => {
                script.failed_attempts += 1;
                return Err(Error {
                    message: "preset failure",
                    kind: ErrorKind::RateLimitExceeded,
                });
            }
            _ => {}
        }

        script.cursor += 1;
        script.failed_attempts = 0;
        Ok(step.to_response())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<ModelResponse, Self::Error>> + Send + 'static
    {
        ready(self.next_response(req))
    }
}
