//! Application tracking: create, read, update, delete, search and summarise
//! the user's graduate applications.

use crate::records::{ApplicationPatch, ApplicationStatus, NewApplication, RecordBook};
use crate::{action, parse, require, require_text, unknown_action};
use async_trait::async_trait;
use chrono::NaiveDate;
use gradwise_core::error::ToolError;
use gradwise_core::state::StateReader;
use gradwise_core::tool::{Tool, ToolArgs, ToolOutput};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Degree recorded when the caller does not name one.
pub const DEFAULT_DEGREE: &str = "MS";

pub struct ApplicationDatabaseTool {
    book: Arc<RecordBook>,
}

impl ApplicationDatabaseTool {
    pub fn new(book: Arc<RecordBook>) -> Self {
        Self { book }
    }
}

#[derive(Deserialize)]
struct CreateArgs {
    school_name: Option<String>,
    program_name: Option<String>,
    #[serde(alias = "degree")]
    degree_type: Option<String>,
    deadline: Option<NaiveDate>,
    status: Option<ApplicationStatus>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct IdArgs {
    app_id: Option<u64>,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: Option<String>,
}

#[derive(Deserialize)]
struct StatusArgs {
    status: Option<ApplicationStatus>,
}

#[async_trait]
impl Tool for ApplicationDatabaseTool {
    fn name(&self) -> &str {
        crate::APPLICATION_DATABASE
    }

    fn description(&self) -> &str {
        "Manage graduate school applications: create, read, update, delete, search, stats, by_status."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "read", "update", "delete", "search", "stats", "by_status"]
                },
                "app_id": { "type": "integer", "description": "Application ID for read, update and delete" },
                "school_name": { "type": "string" },
                "program_name": { "type": "string" },
                "degree_type": { "type": "string", "description": "MS, PhD, MBA, MEng, MA or Other (default MS)" },
                "deadline": { "type": "string", "description": "ISO date, YYYY-MM-DD" },
                "status": {
                    "type": "string",
                    "enum": ["researching", "in_progress", "applied", "interview", "decision"]
                },
                "decision": {
                    "type": "string",
                    "enum": ["pending", "accepted", "rejected", "waitlisted"]
                },
                "notes": { "type": "string" },
                "query": { "type": "string", "description": "Search text for the search action" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        match action(arguments)? {
            "create" => self.create(arguments).await,
            "read" => self.read(arguments).await,
            "update" => self.update(arguments).await,
            "delete" => self.delete(arguments).await,
            "search" => self.search(arguments).await,
            "stats" => self.stats().await,
            "by_status" => self.by_status(arguments).await,
            other => Err(unknown_action(other)),
        }
    }
}

impl ApplicationDatabaseTool {
    async fn create(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: CreateArgs = parse(arguments)?;
        let new = NewApplication {
            school_name: require_text(args.school_name, "school_name")?,
            program_name: require_text(args.program_name, "program_name")?,
            degree_type: args
                .degree_type
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_DEGREE.to_string()),
            deadline: args.deadline,
            status: args.status.unwrap_or(ApplicationStatus::Researching),
            notes: args.notes,
        };

        let app = self.book.create_application(new).await?;
        let mut data = json!({ "id": app.id, "status": app.status });
        if let Some(deadline) = app.deadline {
            data["deadline"] = json!(deadline);
        }
        Ok(ToolOutput::message(format!("Created application for {}", app.label())).with_data(data))
    }

    async fn read(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: IdArgs = parse(arguments)?;
        match args.app_id {
            Some(id) => {
                let app = self
                    .book
                    .application(id)
                    .await
                    .ok_or_else(|| ToolError::InvalidArguments(format!("Application with ID {id} not found")))?;
                Ok(ToolOutput::message(format!("Found application {}", app.label())).with_data(json!(app)))
            }
            None => {
                let apps = self.book.applications().await;
                Ok(ToolOutput::message(format!("Found {} applications", apps.len()))
                    .with_data(json!({ "count": apps.len(), "applications": apps })))
            }
        }
    }

    async fn update(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let id = require(parse::<IdArgs>(arguments)?.app_id, "app_id")?;
        let patch: ApplicationPatch = parse(arguments)?;
        let fields = patch.field_names();
        if fields.is_empty() {
            return Err(ToolError::InvalidArguments("No fields to update".into()));
        }

        let app = self.book.update_application(id, patch).await?;
        Ok(ToolOutput::message(format!("Updated application {}", app.id))
            .with_data(json!({ "id": app.id, "updated_fields": fields })))
    }

    async fn delete(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let id = require(parse::<IdArgs>(arguments)?.app_id, "app_id")?;
        let app = self.book.delete_application(id).await?;
        Ok(ToolOutput::message(format!("Deleted application for {}", app.label()))
            .with_data(json!({ "deleted_id": app.id })))
    }

    async fn search(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let query = require_text(parse::<SearchArgs>(arguments)?.query, "query")?;
        let apps = self.book.search_applications(&query).await;
        Ok(
            ToolOutput::message(format!("Found {} applications matching '{query}'", apps.len()))
                .with_data(json!({ "count": apps.len(), "applications": apps })),
        )
    }

    async fn stats(&self) -> Result<ToolOutput, ToolError> {
        let stats = self
            .book
            .application_stats()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: crate::APPLICATION_DATABASE.into(),
                reason: e.to_string(),
            })?;
        Ok(ToolOutput::message("Application statistics retrieved").with_data(json!(stats)))
    }

    async fn by_status(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let status = require(parse::<StatusArgs>(arguments)?.status, "status")?;
        let apps = self.book.applications_by_status(status).await;
        Ok(ToolOutput::message(format!(
            "Found {} applications with status '{}'",
            apps.len(),
            status.as_str()
        ))
        .with_data(json!({ "count": apps.len(), "applications": apps })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    fn tool() -> ApplicationDatabaseTool {
        ApplicationDatabaseTool::new(Arc::new(RecordBook::in_memory()))
    }

    #[tokio::test]
    async fn create_reports_school_and_program() {
        let tool = tool();
        let out = tool
            .execute(&args(json!({
                "action": "create",
                "school_name": "MIT",
                "program_name": "Computer Science",
                "degree_type": "PhD",
                "deadline": "2025-12-15"
            })))
            .await
            .unwrap();
        assert_eq!(out.message.as_deref(), Some("Created application for MIT Computer Science"));
        let data = out.data.unwrap();
        assert_eq!(data["id"], 1);
        assert_eq!(data["status"], "researching");
        assert_eq!(data["deadline"], "2025-12-15");
    }

    #[tokio::test]
    async fn create_defaults_degree_and_requires_school() {
        let tool = tool();
        tool.execute(&args(json!({
            "action": "create", "school_name": "CMU", "program_name": "Robotics"
        })))
        .await
        .unwrap();
        assert_eq!(tool.book.applications().await[0].degree_type, "MS");

        let err = tool
            .execute(&args(json!({ "action": "create", "program_name": "CS" })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing required parameter: school_name"));
    }

    #[tokio::test]
    async fn bad_deadline_is_rejected() {
        let err = tool()
            .execute(&args(json!({
                "action": "create", "school_name": "MIT", "program_name": "CS", "deadline": "Dec 15"
            })))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn read_update_delete_round() {
        let tool = tool();
        tool.execute(&args(json!({ "action": "create", "school_name": "Stanford", "program_name": "CS" })))
            .await
            .unwrap();

        let listed = tool.execute(&args(json!({ "action": "read" }))).await.unwrap();
        assert_eq!(listed.message.as_deref(), Some("Found 1 applications"));
        assert_eq!(listed.data.unwrap()["applications"][0]["school_name"], "Stanford");

        let updated = tool
            .execute(&args(json!({ "action": "update", "app_id": 1, "status": "applied" })))
            .await
            .unwrap();
        assert_eq!(updated.data.unwrap()["updated_fields"], json!(["status"]));

        let by_status = tool
            .execute(&args(json!({ "action": "by_status", "status": "applied" })))
            .await
            .unwrap();
        assert_eq!(by_status.message.as_deref(), Some("Found 1 applications with status 'applied'"));

        let deleted = tool.execute(&args(json!({ "action": "delete", "app_id": 1 }))).await.unwrap();
        assert_eq!(deleted.message.as_deref(), Some("Deleted application for Stanford CS"));

        let missing = tool.execute(&args(json!({ "action": "read", "app_id": 1 }))).await.unwrap_err();
        assert!(missing.to_string().contains("Application with ID 1 not found"));
    }

    #[tokio::test]
    async fn update_needs_fields() {
        let tool = tool();
        let err = tool
            .execute(&args(json!({ "action": "update", "app_id": 1 })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No fields to update"));
    }

    #[tokio::test]
    async fn search_and_stats() {
        let tool = tool();
        for school in ["MIT", "UC Berkeley"] {
            tool.execute(&args(json!({ "action": "create", "school_name": school, "program_name": "EECS" })))
                .await
                .unwrap();
        }
        let found = tool
            .execute(&args(json!({ "action": "search", "query": "berkeley" })))
            .await
            .unwrap();
        assert_eq!(found.message.as_deref(), Some("Found 1 applications matching 'berkeley'"));

        let stats = tool.execute(&args(json!({ "action": "stats" }))).await.unwrap();
        assert_eq!(stats.data.unwrap()["total"], 2);
    }

    #[tokio::test]
    async fn unknown_action_is_an_error() {
        let err = tool().execute(&args(json!({ "action": "archive" }))).await.unwrap_err();
        assert!(err.to_string().contains("Unknown action: archive"));
    }
}
