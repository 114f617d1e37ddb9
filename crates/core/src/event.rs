//! Domain events published while turns run.
//!
//! Subscribers (the CLI's verbose mode, tests) observe turns without the
//! orchestrator knowing about them.

use crate::turn::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Which path produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPath {
    /// Parsed from the completion backend's decision document
    Backend,
    /// Keyword table
    RuleBased,
}

impl DecisionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionPath::Backend => "backend",
            DecisionPath::RuleBased => "rule_based",
        }
    }
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    TurnStarted {
        session_id: String,
        message_preview: String,
        timestamp: DateTime<Utc>,
    },

    DecisionMade {
        session_id: String,
        path: DecisionPath,
        tool_name: Option<String>,
        timestamp: DateTime<Utc>,
    },

    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A stage degraded to its deterministic path
    FallbackEngaged {
        stage: Stage,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    MemoryStored {
        record_id: String,
        kind: String,
        timestamp: DateTime<Utc>,
    },

    TurnCompleted {
        session_id: String,
        tools_used: Vec<String>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast`; slow subscribers lag rather than block
/// publishers.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
