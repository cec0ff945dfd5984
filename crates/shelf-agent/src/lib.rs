//! A conversational book recommendation agent.
//!
//! The agent talks to an OpenAI-compatible model and searches Google Books
//! for candidates before recommending 5 to 10 books. The crate includes a
//! CLI tool for using in the terminal. And you can also use it as a library,
//! see [`Session`] and the [`chat`] module for the request and response
//! shapes of a chat endpoint.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod chat;
pub mod config;
pub mod google_books;
mod session;
pub mod tools;

pub use session::{DEFAULT_SYSTEM_PROMPT, Session, SessionBuilder};

/// Re-exports of [`shelf_agent_core`] crate.
pub mod core {
    pub use shelf_agent_core::*;
}
