//! The record book: the user's applications, tasks and profile.
//!
//! Held in memory behind a lock and, when opened from a path, written back to
//! a JSON snapshot after every change. A change is applied to a copy first and
//! only swapped in once the snapshot is on disk.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use gradwise_core::error::{Result as CoreResult, ToolError};
use gradwise_core::state::{ApplicationStats, Deadline, StateReader, TaskStats, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Open tasks due within this many days count as urgent.
pub const URGENT_WITHIN_DAYS: i64 = 3;

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Researching,
    InProgress,
    Applied,
    Interview,
    Decision,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Researching => "researching",
            Self::InProgress => "in_progress",
            Self::Applied => "applied",
            Self::Interview => "interview",
            Self::Decision => "decision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[default]
    Pending,
    Accepted,
    Rejected,
    Waitlisted,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Waitlisted => "waitlisted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: u64,
    pub school_name: String,
    pub program_name: String,
    pub degree_type: String,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    pub status: ApplicationStatus,
    #[serde(default)]
    pub decision: Decision,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    /// "School Program", as shown to the user.
    pub fn label(&self) -> String {
        format!("{} {}", self.school_name, self.program_name)
    }
}

pub struct NewApplication {
    pub school_name: String,
    pub program_name: String,
    pub degree_type: String,
    pub deadline: Option<NaiveDate>,
    pub status: ApplicationStatus,
    pub notes: Option<String>,
}

/// Fields to change on an application; `None` leaves a field alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationPatch {
    #[serde(default)]
    pub school_name: Option<String>,
    #[serde(default)]
    pub program_name: Option<String>,
    #[serde(default)]
    pub degree_type: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ApplicationPatch {
    /// Names of the fields this patch sets.
    pub fn field_names(&self) -> Vec<&'static str> {
        [
            ("school_name", self.school_name.is_some()),
            ("program_name", self.program_name.is_some()),
            ("degree_type", self.degree_type.is_some()),
            ("deadline", self.deadline.is_some()),
            ("status", self.status.is_some()),
            ("decision", self.decision.is_some()),
            ("notes", self.notes.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    fn apply(self, app: &mut Application) {
        if let Some(v) = self.school_name {
            app.school_name = v;
        }
        if let Some(v) = self.program_name {
            app.program_name = v;
        }
        if let Some(v) = self.degree_type {
            app.degree_type = v;
        }
        if let Some(v) = self.deadline {
            app.deadline = Some(v);
        }
        if let Some(v) = self.status {
            app.status = v;
        }
        if let Some(v) = self.decision {
            app.decision = v;
        }
        if let Some(v) = self.notes {
            app.notes = Some(v);
        }
        app.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Essay,
    Lor,
    TestScores,
    Forms,
    Interview,
    #[default]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    #[serde(default)]
    pub application_id: Option<u64>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: TaskCategory,
    #[serde(default)]
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Completed
    }

    /// Whole days from `today` to the due date; negative when overdue.
    pub fn days_until(&self, today: NaiveDate) -> Option<i64> {
        self.due_date.map(|d| (d - today).num_days())
    }
}

pub struct NewTask {
    pub title: String,
    pub application_id: Option<u64>,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub category: TaskCategory,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("{kind} with ID {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Failed to persist records to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },

    #[error("Failed to load records from {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

impl From<RecordError> for ToolError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::NotFound { .. } => ToolError::InvalidArguments(e.to_string()),
            other => ToolError::ExecutionFailed {
                tool_name: "records".into(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Book {
    #[serde(default)]
    applications: Vec<Application>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    profile: BTreeMap<String, String>,
    #[serde(default)]
    last_application_id: u64,
    #[serde(default)]
    last_task_id: u64,
}

impl Book {
    fn application_stats(&self) -> ApplicationStats {
        let mut stats = ApplicationStats {
            total: self.applications.len(),
            ..ApplicationStats::default()
        };
        for app in &self.applications {
            *stats.by_status.entry(app.status.as_str().to_string()).or_default() += 1;
            if app.decision != Decision::Pending {
                *stats.by_decision.entry(app.decision.as_str().to_string()).or_default() += 1;
            }
        }
        stats
    }

    fn task_stats(&self, today: NaiveDate) -> TaskStats {
        let completed = self.tasks.iter().filter(|t| !t.is_open()).count();
        let urgent = self
            .tasks
            .iter()
            .filter(|t| t.is_open())
            .filter(|t| t.days_until(today).is_some_and(|d| d <= URGENT_WITHIN_DAYS))
            .count();
        TaskStats {
            total: self.tasks.len(),
            pending: self.tasks.len() - completed,
            completed,
            urgent,
        }
    }

    fn application_label(&self, id: u64) -> Option<String> {
        self.applications.iter().find(|a| a.id == id).map(Application::label)
    }

    fn upcoming_tasks(&self, today: NaiveDate, days: i64) -> Vec<Task> {
        let mut upcoming: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.is_open())
            .filter(|t| t.days_until(today).is_some_and(|d| (0..=days).contains(&d)))
            .cloned()
            .collect();
        upcoming.sort_by_key(|t| t.due_date);
        upcoming
    }

    fn overdue_tasks(&self, today: NaiveDate) -> Vec<Task> {
        let mut overdue: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.is_open())
            .filter(|t| t.days_until(today).is_some_and(|d| d < 0))
            .cloned()
            .collect();
        overdue.sort_by_key(|t| t.due_date);
        overdue
    }

    fn deadlines(&self, today: NaiveDate, days: i64) -> Vec<Deadline> {
        let in_window = |d: NaiveDate| (0..=days).contains(&(d - today).num_days());

        let mut deadlines: Vec<Deadline> = self
            .applications
            .iter()
            .filter_map(|a| {
                let due = a.deadline.filter(|d| in_window(*d))?;
                Some(Deadline {
                    title: format!("{} application", a.label()),
                    due,
                    label: Some(a.status.as_str().to_string()),
                })
            })
            .collect();

        deadlines.extend(self.upcoming_tasks(today, days).into_iter().filter_map(|t| {
            Some(Deadline {
                due: t.due_date?,
                label: t.application_id.and_then(|id| self.application_label(id)),
                title: t.title,
            })
        }));

        deadlines.sort_by_key(|d| d.due);
        deadlines
    }
}

/// Applications, tasks and profile for one user.
pub struct RecordBook {
    book: RwLock<Book>,
    path: Option<PathBuf>,
}

impl RecordBook {
    pub fn in_memory() -> Self {
        Self {
            book: RwLock::new(Book::default()),
            path: None,
        }
    }

    /// Load the snapshot at `path`, or start empty if there is none.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let path = path.into();
        let book = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| RecordError::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Book::default(),
            Err(e) => {
                return Err(RecordError::Load {
                    path,
                    reason: e.to_string(),
                });
            }
        };
        debug!(path = %path.display(), applications = book.applications.len(), tasks = book.tasks.len(), "Record book loaded");
        Ok(Self {
            book: RwLock::new(book),
            path: Some(path),
        })
    }

    fn persist(&self, book: &Book) -> Result<(), RecordError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let persist_err = |reason: String| RecordError::Persist {
            path: path.clone(),
            reason,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(book).map_err(|e| persist_err(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to write record book");
            persist_err(e.to_string())
        })
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Book) -> Result<T, RecordError>) -> Result<T, RecordError> {
        let mut guard = self.book.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    pub async fn create_application(&self, new: NewApplication) -> Result<Application, RecordError> {
        self.mutate(|book| {
            book.last_application_id += 1;
            let now = Utc::now();
            let app = Application {
                id: book.last_application_id,
                school_name: new.school_name,
                program_name: new.program_name,
                degree_type: new.degree_type,
                deadline: new.deadline,
                status: new.status,
                decision: Decision::Pending,
                notes: new.notes,
                created_at: now,
                updated_at: now,
            };
            book.applications.push(app.clone());
            Ok(app)
        })
        .await
    }

    pub async fn application(&self, id: u64) -> Option<Application> {
        self.book.read().await.applications.iter().find(|a| a.id == id).cloned()
    }

    pub async fn applications(&self) -> Vec<Application> {
        self.book.read().await.applications.clone()
    }

    pub async fn update_application(&self, id: u64, patch: ApplicationPatch) -> Result<Application, RecordError> {
        self.mutate(|book| {
            let app = book
                .applications
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(RecordError::NotFound { kind: "Application", id })?;
            patch.apply(app);
            Ok(app.clone())
        })
        .await
    }

    /// Remove an application and return what was removed.
    pub async fn delete_application(&self, id: u64) -> Result<Application, RecordError> {
        self.mutate(|book| {
            let pos = book
                .applications
                .iter()
                .position(|a| a.id == id)
                .ok_or(RecordError::NotFound { kind: "Application", id })?;
            Ok(book.applications.remove(pos))
        })
        .await
    }

    /// Case-insensitive match on school, program or notes.
    pub async fn search_applications(&self, query: &str) -> Vec<Application> {
        let needle = query.to_lowercase();
        self.book
            .read()
            .await
            .applications
            .iter()
            .filter(|a| {
                a.school_name.to_lowercase().contains(&needle)
                    || a.program_name.to_lowercase().contains(&needle)
                    || a.notes.as_deref().is_some_and(|n| n.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect()
    }

    pub async fn applications_by_status(&self, status: ApplicationStatus) -> Vec<Application> {
        self.book
            .read()
            .await
            .applications
            .iter()
            .filter(|a| a.status == status)
            .cloned()
            .collect()
    }

    pub async fn create_task(&self, new: NewTask) -> Result<Task, RecordError> {
        self.mutate(|book| {
            book.last_task_id += 1;
            let task = Task {
                id: book.last_task_id,
                application_id: new.application_id,
                title: new.title,
                description: new.description,
                due_date: new.due_date,
                priority: new.priority,
                category: new.category,
                status: TaskStatus::Pending,
                created_at: Utc::now(),
                completed_at: None,
            };
            book.tasks.push(task.clone());
            Ok(task)
        })
        .await
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.book.read().await.tasks.clone()
    }

    pub async fn tasks_for_application(&self, application_id: u64) -> Vec<Task> {
        self.book
            .read()
            .await
            .tasks
            .iter()
            .filter(|t| t.application_id == Some(application_id))
            .cloned()
            .collect()
    }

    pub async fn complete_task(&self, id: u64) -> Result<Task, RecordError> {
        self.mutate(|book| {
            let task = book
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(RecordError::NotFound { kind: "Task", id })?;
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
            Ok(task.clone())
        })
        .await
    }

    pub async fn delete_task(&self, id: u64) -> Result<Task, RecordError> {
        self.mutate(|book| {
            let pos = book
                .tasks
                .iter()
                .position(|t| t.id == id)
                .ok_or(RecordError::NotFound { kind: "Task", id })?;
            Ok(book.tasks.remove(pos))
        })
        .await
    }

    /// Open tasks due between `today` and `today + days`, soonest first.
    pub async fn upcoming_tasks(&self, today: NaiveDate, days: i64) -> Vec<Task> {
        self.book.read().await.upcoming_tasks(today, days)
    }

    /// Open tasks past their due date, most overdue first.
    pub async fn overdue_tasks(&self, today: NaiveDate) -> Vec<Task> {
        self.book.read().await.overdue_tasks(today)
    }

    /// The label of application `id`, if it exists.
    pub async fn application_label(&self, id: u64) -> Option<String> {
        self.book.read().await.application_label(id)
    }

    pub async fn set_profile_field(&self, key: impl Into<String>, value: impl Into<String>) -> Result<(), RecordError> {
        let (key, value) = (key.into(), value.into());
        self.mutate(|book| {
            book.profile.insert(key, value);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl StateReader for RecordBook {
    async fn application_stats(&self) -> CoreResult<ApplicationStats> {
        Ok(self.book.read().await.application_stats())
    }

    async fn task_stats(&self) -> CoreResult<TaskStats> {
        Ok(self.book.read().await.task_stats(today()))
    }

    async fn upcoming_deadlines(&self, days: u32) -> CoreResult<Vec<Deadline>> {
        Ok(self.book.read().await.deadlines(today(), i64::from(days)))
    }

    async fn profile(&self) -> CoreResult<UserProfile> {
        Ok(UserProfile {
            fields: self.book.read().await.profile.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gradwise_core::state::StateSummary;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_app(school: &str, deadline: Option<&str>) -> NewApplication {
        NewApplication {
            school_name: school.into(),
            program_name: "Computer Science".into(),
            degree_type: "PhD".into(),
            deadline: deadline.map(date),
            status: ApplicationStatus::Researching,
            notes: None,
        }
    }

    fn new_task(title: &str, due: Option<NaiveDate>) -> NewTask {
        NewTask {
            title: title.into(),
            application_id: None,
            description: None,
            due_date: due,
            priority: Priority::default(),
            category: TaskCategory::default(),
        }
    }

    #[tokio::test]
    async fn application_lifecycle() {
        let book = RecordBook::in_memory();
        let mit = book.create_application(new_app("MIT", Some("2025-12-15"))).await.unwrap();
        let stanford = book.create_application(new_app("Stanford", None)).await.unwrap();
        assert_eq!((mit.id, stanford.id), (1, 2));

        let patch = ApplicationPatch {
            status: Some(ApplicationStatus::Decision),
            decision: Some(Decision::Accepted),
            ..ApplicationPatch::default()
        };
        assert_eq!(patch.field_names(), vec!["status", "decision"]);
        let updated = book.update_application(mit.id, patch).await.unwrap();
        assert_eq!(updated.decision, Decision::Accepted);

        let stats = book.application_stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.get("researching"), Some(&1));
        assert_eq!(stats.by_decision.get("accepted"), Some(&1));
        assert!(!stats.by_decision.contains_key("pending"));

        let removed = book.delete_application(stanford.id).await.unwrap();
        assert_eq!(removed.label(), "Stanford Computer Science");
        assert!(matches!(
            book.delete_application(stanford.id).await,
            Err(RecordError::NotFound { id: 2, .. })
        ));

        // Ids are never reused.
        let cmu = book.create_application(new_app("CMU", None)).await.unwrap();
        assert_eq!(cmu.id, 3);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let book = RecordBook::in_memory();
        book.create_application(new_app("Georgia Tech", None)).await.unwrap();
        book.create_application(new_app("MIT", None)).await.unwrap();
        assert_eq!(book.search_applications("georgia").await.len(), 1);
        assert_eq!(book.search_applications("computer").await.len(), 2);
    }

    #[test]
    fn upcoming_overdue_and_urgent_windows() {
        let today = date("2025-11-01");
        let mut book = Book::default();
        for (id, (title, due)) in [
            ("overdue", Some("2025-10-30")),
            ("today", Some("2025-11-01")),
            ("in five days", Some("2025-11-06")),
            ("next month", Some("2025-12-01")),
            ("undated", None),
        ]
        .into_iter()
        .enumerate()
        {
            book.tasks.push(Task {
                id: id as u64 + 1,
                application_id: None,
                title: title.into(),
                description: None,
                due_date: due.map(date),
                priority: Priority::High,
                category: TaskCategory::Forms,
                status: TaskStatus::Pending,
                created_at: Utc::now(),
                completed_at: None,
            });
        }

        let upcoming: Vec<String> = book.upcoming_tasks(today, 7).into_iter().map(|t| t.title).collect();
        assert_eq!(upcoming, vec!["today", "in five days"]);

        let overdue: Vec<String> = book.overdue_tasks(today).into_iter().map(|t| t.title).collect();
        assert_eq!(overdue, vec!["overdue"]);

        let stats = book.task_stats(today);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 5);
        assert_eq!(stats.urgent, 2);
    }

    #[tokio::test]
    async fn completed_tasks_leave_windows() {
        let book = RecordBook::in_memory();
        let task = book
            .create_task(new_task("Send transcripts", Some(today() + Duration::days(1))))
            .await
            .unwrap();
        assert_eq!(book.upcoming_tasks(today(), 7).await.len(), 1);

        book.complete_task(task.id).await.unwrap();
        assert!(book.upcoming_tasks(today(), 7).await.is_empty());
        let stats = book.task_stats().await.unwrap();
        assert_eq!((stats.completed, stats.urgent), (1, 0));
    }

    #[tokio::test]
    async fn summary_lists_application_and_task_deadlines() {
        let book = RecordBook::in_memory();
        let soon = today() + Duration::days(3);
        let app = book
            .create_application(NewApplication {
                deadline: Some(soon),
                ..new_app("MIT", None)
            })
            .await
            .unwrap();
        book.create_task(NewTask {
            application_id: Some(app.id),
            ..new_task("Finish SOP", Some(today() + Duration::days(1)))
        })
        .await
        .unwrap();
        book.set_profile_field("target_term", "Fall 2026").await.unwrap();

        let summary = StateSummary::collect(&book, 7).await.unwrap();
        assert_eq!(summary.deadlines.len(), 2);
        assert_eq!(summary.deadlines[0].title, "Finish SOP");
        assert_eq!(summary.deadlines[0].label.as_deref(), Some("MIT Computer Science"));
        assert_eq!(summary.deadlines[1].title, "MIT Computer Science application");
        assert!(summary.to_string().contains("target_term=Fall 2026"));
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");

        let book = RecordBook::open(&path).unwrap();
        book.create_application(new_app("MIT", Some("2025-12-15"))).await.unwrap();
        book.create_task(new_task("Request letters", None)).await.unwrap();

        let reopened = RecordBook::open(&path).unwrap();
        let apps = reopened.applications().await;
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].deadline, Some(date("2025-12-15")));
        assert_eq!(reopened.tasks().await.len(), 1);

        let next = reopened.create_application(new_app("CMU", None)).await.unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn corrupt_snapshot_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(RecordBook::open(&path), Err(RecordError::Load { .. })));
    }
}
