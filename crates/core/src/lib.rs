//! # Gradwise Core
//!
//! Domain types, traits, and error definitions for the Gradwise graduate
//! application assistant. Every subsystem (completion provider, retrieval
//! store, tools, structured state) is a trait here; implementations live in
//! their own crates and all crates depend inward on this one.

pub mod decision;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod provider;
pub mod state;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use decision::{DecisionDocument, DecisionOutcome};
pub use error::{DecisionParseError, Error, MemoryError, ProviderError, Result, ToolError};
pub use event::{DecisionPath, DomainEvent, EventBus};
pub use memory::{Embedder, MemoryRecord, Metadata, RecordKind, RetrievalStore, ScoredRecord};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use state::{StateReader, StateSummary};
pub use tool::{Tool, ToolArgs, ToolInvocation, ToolOutcome, ToolOutput, ToolRegistry};
pub use turn::{Stage, TraceStep, Turn, TurnReply};
