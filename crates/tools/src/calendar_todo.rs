//! Tasks and deadlines: create, list, complete and delete to-dos, and report
//! what is coming up or overdue.

use crate::records::{NewTask, Priority, RecordBook, Task, TaskCategory, TaskStatus, URGENT_WITHIN_DAYS, today};
use crate::{action, parse, require, require_text, unknown_action};
use async_trait::async_trait;
use chrono::NaiveDate;
use gradwise_core::error::ToolError;
use gradwise_core::tool::{Tool, ToolArgs, ToolOutput};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Window used by `upcoming` when `days_ahead` is not given.
pub const DEFAULT_DAYS_AHEAD: i64 = 7;

pub struct CalendarTodoTool {
    book: Arc<RecordBook>,
}

impl CalendarTodoTool {
    pub fn new(book: Arc<RecordBook>) -> Self {
        Self { book }
    }
}

#[derive(Deserialize)]
struct CreateArgs {
    title: Option<String>,
    application_id: Option<u64>,
    description: Option<String>,
    due_date: Option<NaiveDate>,
    priority: Option<Priority>,
    category: Option<TaskCategory>,
}

#[derive(Deserialize)]
struct TaskIdArgs {
    task_id: Option<u64>,
}

#[derive(Deserialize)]
struct UpcomingArgs {
    days_ahead: Option<i64>,
}

#[derive(Deserialize)]
struct ApplicationArgs {
    application_id: Option<u64>,
}

/// A task annotated with how soon it is due.
fn with_urgency(task: &Task, today: NaiveDate) -> serde_json::Value {
    let mut value = json!(task);
    if let Some(days) = task.days_until(today) {
        value["days_until_due"] = json!(days);
        value["urgency"] = json!(if days <= URGENT_WITHIN_DAYS { "urgent" } else { "upcoming" });
    }
    value
}

#[async_trait]
impl Tool for CalendarTodoTool {
    fn name(&self) -> &str {
        crate::CALENDAR_TODO
    }

    fn description(&self) -> &str {
        "Manage application tasks and deadlines: create_task, list_tasks, complete_task, delete_task, upcoming, overdue, by_application."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create_task", "list_tasks", "complete_task", "delete_task", "upcoming", "overdue", "by_application"]
                },
                "task_id": { "type": "integer" },
                "application_id": { "type": "integer" },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "due_date": { "type": "string", "description": "ISO date, YYYY-MM-DD" },
                "priority": { "type": "string", "enum": ["high", "medium", "low"] },
                "category": {
                    "type": "string",
                    "enum": ["essay", "lor", "test_scores", "forms", "interview", "other"]
                },
                "days_ahead": { "type": "integer", "description": "Window for upcoming (default 7)" }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        match action(arguments)? {
            "create_task" => self.create_task(arguments).await,
            "list_tasks" => self.list_tasks().await,
            "complete_task" => self.complete_task(arguments).await,
            "delete_task" => self.delete_task(arguments).await,
            "upcoming" => self.upcoming(arguments).await,
            "overdue" => self.overdue().await,
            "by_application" => self.by_application(arguments).await,
            other => Err(unknown_action(other)),
        }
    }
}

impl CalendarTodoTool {
    async fn create_task(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let args: CreateArgs = parse(arguments)?;
        let new = NewTask {
            title: require_text(args.title, "title")?,
            application_id: args.application_id,
            description: args.description,
            due_date: args.due_date,
            priority: args.priority.unwrap_or_default(),
            category: args.category.unwrap_or_default(),
        };
        if let Some(id) = new.application_id {
            if self.book.application(id).await.is_none() {
                return Err(ToolError::InvalidArguments(format!("Application with ID {id} not found")));
            }
        }

        let task = self.book.create_task(new).await?;
        let mut message = format!("Created task: '{}'", task.title);
        if let Some(due) = task.due_date {
            message.push_str(&format!(" (due: {due})"));
        }
        Ok(ToolOutput::message(message).with_data(json!({ "task_id": task.id, "title": task.title })))
    }

    async fn list_tasks(&self) -> Result<ToolOutput, ToolError> {
        let tasks = self.book.tasks().await;
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let (pending, in_progress, completed) = (
            count(TaskStatus::Pending),
            count(TaskStatus::InProgress),
            count(TaskStatus::Completed),
        );
        Ok(ToolOutput::message(format!(
            "Found {} tasks ({pending} pending, {completed} completed)",
            tasks.len()
        ))
        .with_data(json!({
            "total": tasks.len(),
            "pending": pending,
            "in_progress": in_progress,
            "completed": completed,
            "tasks": tasks,
        })))
    }

    async fn complete_task(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let id = require(parse::<TaskIdArgs>(arguments)?.task_id, "task_id")?;
        let task = self.book.complete_task(id).await?;
        Ok(ToolOutput::message(format!("Task {} marked as complete", task.id))
            .with_data(json!({ "task_id": task.id, "title": task.title })))
    }

    async fn delete_task(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let id = require(parse::<TaskIdArgs>(arguments)?.task_id, "task_id")?;
        let task = self.book.delete_task(id).await?;
        Ok(ToolOutput::message(format!("Task {} deleted", task.id)).with_data(json!({ "deleted_id": task.id })))
    }

    async fn upcoming(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let days = parse::<UpcomingArgs>(arguments)?
            .days_ahead
            .unwrap_or(DEFAULT_DAYS_AHEAD);
        if days < 0 {
            return Err(ToolError::InvalidArguments("days_ahead must not be negative".into()));
        }

        let today = today();
        let tasks: Vec<serde_json::Value> = self
            .book
            .upcoming_tasks(today, days)
            .await
            .iter()
            .map(|t| with_urgency(t, today))
            .collect();

        let message = if tasks.is_empty() {
            format!("No tasks due in the next {days} days")
        } else {
            format!("Found {} tasks due in the next {days} days", tasks.len())
        };
        Ok(ToolOutput::message(message).with_data(json!({
            "count": tasks.len(),
            "days_ahead": days,
            "upcoming_tasks": tasks,
        })))
    }

    async fn overdue(&self) -> Result<ToolOutput, ToolError> {
        let today = today();
        let tasks: Vec<serde_json::Value> = self
            .book
            .overdue_tasks(today)
            .await
            .iter()
            .map(|t| {
                let mut value = json!(t);
                value["days_overdue"] = json!(-t.days_until(today).unwrap_or_default());
                value
            })
            .collect();

        let message = if tasks.is_empty() {
            "No overdue tasks".to_string()
        } else {
            format!("You have {} overdue tasks!", tasks.len())
        };
        Ok(ToolOutput::message(message).with_data(json!({ "count": tasks.len(), "overdue_tasks": tasks })))
    }

    async fn by_application(&self, arguments: &ToolArgs) -> Result<ToolOutput, ToolError> {
        let id = require(parse::<ApplicationArgs>(arguments)?.application_id, "application_id")?;
        let label = self
            .book
            .application_label(id)
            .await
            .ok_or_else(|| ToolError::InvalidArguments(format!("Application with ID {id} not found")))?;
        let tasks = self.book.tasks_for_application(id).await;
        Ok(ToolOutput::message(format!("Found {} tasks for {label}", tasks.len()))
            .with_data(json!({ "count": tasks.len(), "tasks": tasks })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    fn tool() -> CalendarTodoTool {
        CalendarTodoTool::new(Arc::new(RecordBook::in_memory()))
    }

    fn in_days(days: i64) -> String {
        (today() + Duration::days(days)).to_string()
    }

    #[tokio::test]
    async fn upcoming_with_nothing_scheduled() {
        let out = tool().execute(&args(json!({ "action": "upcoming" }))).await.unwrap();
        assert_eq!(out.message.as_deref(), Some("No tasks due in the next 7 days"));
        let data = out.data.unwrap();
        assert_eq!(data["count"], 0);
        assert_eq!(data["days_ahead"], 7);
    }

    #[tokio::test]
    async fn upcoming_marks_urgency() {
        let tool = tool();
        for (title, days) in [("Send GRE scores", 2), ("Polish SOP", 6), ("Visit day", 20)] {
            tool.execute(&args(json!({ "action": "create_task", "title": title, "due_date": in_days(days) })))
                .await
                .unwrap();
        }

        let out = tool.execute(&args(json!({ "action": "upcoming" }))).await.unwrap();
        assert_eq!(out.message.as_deref(), Some("Found 2 tasks due in the next 7 days"));
        let data = out.data.unwrap();
        assert_eq!(data["upcoming_tasks"][0]["title"], "Send GRE scores");
        assert_eq!(data["upcoming_tasks"][0]["urgency"], "urgent");
        assert_eq!(data["upcoming_tasks"][1]["urgency"], "upcoming");

        let wide = tool
            .execute(&args(json!({ "action": "upcoming", "days_ahead": 30 })))
            .await
            .unwrap();
        assert_eq!(wide.data.unwrap()["count"], 3);
    }

    #[tokio::test]
    async fn create_complete_and_list() {
        let tool = tool();
        let created = tool
            .execute(&args(json!({
                "action": "create_task", "title": "Request letters", "due_date": "2025-11-20", "category": "lor"
            })))
            .await
            .unwrap();
        assert_eq!(
            created.message.as_deref(),
            Some("Created task: 'Request letters' (due: 2025-11-20)")
        );

        let done = tool
            .execute(&args(json!({ "action": "complete_task", "task_id": 1 })))
            .await
            .unwrap();
        assert_eq!(done.message.as_deref(), Some("Task 1 marked as complete"));

        tool.execute(&args(json!({ "action": "create_task", "title": "Fill forms" })))
            .await
            .unwrap();
        let listed = tool.execute(&args(json!({ "action": "list_tasks" }))).await.unwrap();
        assert_eq!(listed.message.as_deref(), Some("Found 2 tasks (1 pending, 1 completed)"));
    }

    #[tokio::test]
    async fn overdue_excludes_completed() {
        let tool = tool();
        for title in ["Late form", "Late essay"] {
            tool.execute(&args(json!({ "action": "create_task", "title": title, "due_date": in_days(-2) })))
                .await
                .unwrap();
        }
        tool.execute(&args(json!({ "action": "complete_task", "task_id": 2 })))
            .await
            .unwrap();

        let out = tool.execute(&args(json!({ "action": "overdue" }))).await.unwrap();
        assert_eq!(out.message.as_deref(), Some("You have 1 overdue tasks!"));
        assert_eq!(out.data.unwrap()["overdue_tasks"][0]["days_overdue"], 2);
    }

    #[tokio::test]
    async fn task_errors() {
        let tool = tool();
        let err = tool
            .execute(&args(json!({ "action": "create_task" })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("title"));

        let err = tool
            .execute(&args(json!({ "action": "complete_task", "task_id": 9 })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Task with ID 9 not found"));

        let err = tool
            .execute(&args(json!({ "action": "create_task", "title": "x", "application_id": 4 })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Application with ID 4 not found"));
    }
}
