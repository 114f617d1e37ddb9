//! Budget-aware context assembly and the token estimate it relies on.

pub mod assembler;
pub mod token;

pub use assembler::{AssembledContext, ContextAssembler, ContextLimits};
pub use token::{DEFAULT_TOKENS_PER_WORD, estimate_tokens};
