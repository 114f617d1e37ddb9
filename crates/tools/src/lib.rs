//! The assistant's tools.
//!
//! Four tools over one [`RecordBook`]: application tracking, tasks and
//! deadlines, program research and essay feedback. Each takes an `action`
//! (or analysis type) plus keyword arguments and reports failures as
//! [`ToolError`]s, which the registry folds into failed results.

pub mod application_database;
pub mod calendar_todo;
pub mod essay_analyzer;
pub mod program_research;
pub mod records;

use gradwise_core::error::ToolError;
use gradwise_core::tool::{ToolArgs, ToolRegistry};
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub use application_database::ApplicationDatabaseTool;
pub use calendar_todo::CalendarTodoTool;
pub use essay_analyzer::EssayAnalyzerTool;
pub use program_research::ProgramResearchTool;
pub use records::{RecordBook, RecordError};

pub const APPLICATION_DATABASE: &str = "application_database";
pub const CALENDAR_TODO: &str = "calendar_todo";
pub const PROGRAM_RESEARCH: &str = "program_research";
pub const ESSAY_ANALYZER: &str = "essay_analyzer";

/// A registry holding all four tools, sharing `book`.
pub fn default_registry(book: Arc<RecordBook>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ApplicationDatabaseTool::new(book.clone())));
    registry.register(Box::new(CalendarTodoTool::new(book)));
    registry.register(Box::new(ProgramResearchTool));
    registry.register(Box::new(EssayAnalyzerTool));
    registry
}

/// The `action` argument of an action-style tool.
pub(crate) fn action(arguments: &ToolArgs) -> Result<&str, ToolError> {
    arguments
        .get("action")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("Missing required parameter: action".into()))
}

pub(crate) fn unknown_action(action: &str) -> ToolError {
    ToolError::InvalidArguments(format!("Unknown action: {action}"))
}

/// Deserialize the argument map into a typed argument struct.
pub(crate) fn parse<T: DeserializeOwned>(arguments: &ToolArgs) -> Result<T, ToolError> {
    serde_json::from_value(serde_json::Value::Object(arguments.clone()))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

pub(crate) fn require<T>(value: Option<T>, field: &str) -> Result<T, ToolError> {
    value.ok_or_else(|| ToolError::InvalidArguments(format!("Missing required parameter: {field}")))
}

/// Like [`require`], treating blank text as missing.
pub(crate) fn require_text(value: Option<String>, field: &str) -> Result<String, ToolError> {
    require(
        value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
        field,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_holds_the_four_tools() {
        let registry = default_registry(Arc::new(RecordBook::in_memory()));
        assert_eq!(
            registry.names(),
            vec![APPLICATION_DATABASE, CALENDAR_TODO, ESSAY_ANALYZER, PROGRAM_RESEARCH]
        );
        assert!(registry.definitions().iter().all(|d| d.parameters["type"] == "object"));
    }

    #[test]
    fn action_must_be_present() {
        let args = ToolArgs::new();
        assert_eq!(
            action(&args).unwrap_err().to_string(),
            "Invalid tool arguments: Missing required parameter: action"
        );
        let args = json!({ "action": "  " }).as_object().cloned().unwrap();
        assert!(action(&args).is_err());
    }

    #[test]
    fn blank_text_counts_as_missing() {
        assert!(require_text(Some("  ".into()), "title").is_err());
        assert_eq!(require_text(Some(" SOP ".into()), "title").unwrap(), "SOP");
    }
}
