//! Tools the recommendation agent can call.

pub mod normalize;
mod search_books;

pub use search_books::{SearchBooksOutput, SearchBooksParameters, SearchBooksTool};
