//! An abstraction layer for chat-completion models.
//!
//! This crate establishes an unified protocol for the agent to talk to a
//! completion endpoint, so that the agent loop doesn't depend on any
//! particular vendor API.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. A provider performs
//! exactly one request/response exchange per call, retry policies (if any)
//! belong to the caller.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
