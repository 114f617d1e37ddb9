//! Tool trait: the abstraction over the assistant's side-effecting
//! capabilities.
//!
//! The registry never lets a tool failure escape: unknown names, handler
//! errors, panics and timeouts all come back as a failed [`ToolInvocation`].

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Keyword arguments passed to a tool.
pub type ToolArgs = serde_json::Map<String, serde_json::Value>;

/// Default upper bound for a single tool call.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(15);

/// A durable by-product of a tool call (e.g. an analysed essay draft) that
/// the orchestrator persists as a domain note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub body: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// What a tool hands back on success.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
    pub artifact: Option<Artifact>,
}

impl ToolOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }
}

/// The result of one tool call: success-with-payload or failure-with-error,
/// never both.
///
/// Serializes to `{success, message?, data?, error?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResult", try_from = "WireResult")]
pub enum ToolOutcome {
    Success {
        message: Option<String>,
        data: Option<serde_json::Value>,
    },
    Failure {
        error: String,
    },
}

impl ToolOutcome {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { message, .. } => message.as_deref(),
            Self::Failure { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success { data, .. } => data.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// The wire form as a JSON value.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize)]
struct WireResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<ToolOutcome> for WireResult {
    fn from(outcome: ToolOutcome) -> Self {
        match outcome {
            ToolOutcome::Success { message, data } => Self {
                success: true,
                message,
                data,
                error: None,
            },
            ToolOutcome::Failure { error } => Self {
                success: false,
                message: None,
                data: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<WireResult> for ToolOutcome {
    type Error = String;

    fn try_from(wire: WireResult) -> Result<Self, Self::Error> {
        match (wire.success, wire.error) {
            (true, None) => Ok(Self::Success {
                message: wire.message,
                data: wire.data,
            }),
            (false, Some(error)) => Ok(Self::Failure { error }),
            (true, Some(_)) => Err("successful tool result must not carry an error".into()),
            (false, None) => Err("failed tool result must carry an error".into()),
        }
    }
}

/// One executed tool call, as recorded on a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: ToolArgs,
    pub result: ToolOutcome,
    pub duration_ms: u64,
    #[serde(skip)]
    pub artifact: Option<Artifact>,
}

/// The core Tool trait.
///
/// Each tool is a value carrying its own name, schema and handler. Tools are
/// registered once at startup and dispatched by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "application_database").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given keyword arguments.
    async fn execute(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Bound every dispatched call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::from(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// All registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Execute a tool by name.
    ///
    /// Never fails: every problem is folded into a failed [`ToolOutcome`].
    pub async fn dispatch(&self, name: &str, arguments: ToolArgs) -> ToolInvocation {
        let Some(tool) = self.tools.get(name).cloned() else {
            warn!(tool = %name, "Dispatch requested for unregistered tool");
            return ToolInvocation {
                name: name.to_string(),
                result: ToolOutcome::failure(ToolError::NotFound(name.to_string()).to_string()),
                arguments,
                duration_ms: 0,
                artifact: None,
            };
        };

        let started = Instant::now();
        let call = AssertUnwindSafe(tool.execute(&arguments)).catch_unwind();
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(ToolError::Panicked {
                tool_name: name.to_string(),
                reason: panic_reason(panic.as_ref()),
            }),
            Err(_) => Err(ToolError::Timeout {
                tool_name: name.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (result, artifact) = match result {
            Ok(output) => (
                ToolOutcome::Success {
                    message: output.message,
                    data: output.data,
                },
                output.artifact,
            ),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                (ToolOutcome::failure(e.to_string()), None)
            }
        };
        debug!(tool = %name, success = result.is_success(), duration_ms, "Tool dispatched");

        ToolInvocation {
            name: name.to_string(),
            arguments,
            result,
            duration_ms,
            artifact,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
