//! Turn records: what happened while answering one message.

use crate::tool::ToolInvocation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The orchestrator's stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Observe,
    Decide,
    Act,
    Respond,
    Store,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Observe => "observe",
            Stage::Decide => "decide",
            Stage::Act => "act",
            Stage::Respond => "respond",
            Stage::Store => "store",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub stage: Stage,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

impl TraceStep {
    pub fn new(stage: Stage, note: impl Into<String>) -> Self {
        Self {
            stage,
            note: note.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A turn in progress. Frozen into a [`TurnReply`] once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: String,
    pub message: String,
    pub invocations: Vec<ToolInvocation>,
    pub trace: Vec<TraceStep>,
    pub response: String,
    pub started_at: DateTime<Utc>,
}

impl Turn {
    pub fn begin(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            invocations: Vec::new(),
            trace: Vec::new(),
            response: String::new(),
            started_at: Utc::now(),
        }
    }

    /// Record that `stage` ran.
    pub fn step(&mut self, stage: Stage, note: impl Into<String>) {
        self.trace.push(TraceStep::new(stage, note));
    }

    /// Names of the tools invoked, in order.
    pub fn tools_used(&self) -> Vec<String> {
        self.invocations.iter().map(|i| i.name.clone()).collect()
    }

    pub fn finish(self) -> TurnReply {
        TurnReply {
            tools_used: self.tools_used(),
            response: self.response,
            trace: self.trace,
        }
    }
}

/// What a caller of `process_turn` gets back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub response: String,
    pub tools_used: Vec<String>,
    pub trace: Vec<TraceStep>,
}

impl TurnReply {
    pub fn stages(&self) -> Vec<Stage> {
        self.trace.iter().map(|s| s.stage).collect()
    }
}
