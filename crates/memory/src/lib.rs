//! Retrieval store implementations for Gradwise.

pub mod journal;
pub mod lexical;
pub mod noop;
pub mod store;
pub mod vector;

pub use journal::Journal;
pub use lexical::{lexical_rank, tokenize};
pub use noop::NoopStore;
pub use store::LocalStore;
pub use vector::{cosine_similarity, vector_rank};
