//! The turn loop of the Gradwise assistant.
//!
//! Every message runs through **Observe → Decide → Act → Respond → Store**:
//!
//! 1. **Observe**: read the record summary and assemble memory context
//! 2. **Decide**: pick a tool, with the completion backend or keyword rules
//! 3. **Act**: dispatch the tool through the registry
//! 4. **Respond**: write the reply, or format one from the tool result
//! 5. **Store**: persist the exchange and append it to the session window
//!
//! Each stage has a deterministic path, so a turn completes even with no
//! completion backend, no embedder and failing tools.

pub mod backend;
pub mod context;
pub mod decision;
pub mod orchestrator;
pub mod session;
pub mod window;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use backend::CompletionBackend;
pub use context::{AssembledContext, ContextAssembler, ContextLimits};
pub use decision::{Decision, DecisionEngine, rule_based};
pub use orchestrator::{Orchestrator, OrchestratorSettings, fallback_response};
pub use session::{Session, SessionRegistry};
pub use window::ConversationWindow;
