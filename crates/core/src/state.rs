//! Read-only view of the user's applications, tasks and profile that the
//! assistant consults each turn.
//!
//! How those records are modelled and persisted is not the agent's concern;
//! it only reads summaries through [`StateReader`].

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Application counts by status and by decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_decision: BTreeMap<String, usize>,
}

/// Task counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    /// Open tasks due within three days (or overdue).
    pub urgent: usize,
}

/// Something due on a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    pub title: String,
    pub due: NaiveDate,
    /// The application this deadline belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Free-form profile fields (name, target term, GPA, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub fields: BTreeMap<String, String>,
}

/// Read interface onto the structured records.
#[async_trait]
pub trait StateReader: Send + Sync {
    async fn application_stats(&self) -> Result<ApplicationStats>;

    async fn task_stats(&self) -> Result<TaskStats>;

    /// Deadlines due within `days` from today, soonest first.
    async fn upcoming_deadlines(&self, days: u32) -> Result<Vec<Deadline>>;

    async fn profile(&self) -> Result<UserProfile>;
}

/// A reader with nothing in it.
pub struct NoopState;

#[async_trait]
impl StateReader for NoopState {
    async fn application_stats(&self) -> Result<ApplicationStats> {
        Ok(ApplicationStats::default())
    }

    async fn task_stats(&self) -> Result<TaskStats> {
        Ok(TaskStats::default())
    }

    async fn upcoming_deadlines(&self, _days: u32) -> Result<Vec<Deadline>> {
        Ok(Vec::new())
    }

    async fn profile(&self) -> Result<UserProfile> {
        Ok(UserProfile::default())
    }
}

/// Everything the assistant knows about the user's records, in one value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub applications: ApplicationStats,
    pub tasks: TaskStats,
    pub deadlines: Vec<Deadline>,
    pub profile: UserProfile,
}

impl StateSummary {
    /// Read a full summary; deadlines cover the next `days` days.
    pub async fn collect(reader: &dyn StateReader, days: u32) -> Result<Self> {
        Ok(Self {
            applications: reader.application_stats().await?,
            tasks: reader.task_stats().await?,
            deadlines: reader.upcoming_deadlines(days).await?,
            profile: reader.profile().await?,
        })
    }
}

fn join_counts(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for StateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.applications.total == 0 {
            writeln!(f, "Applications: none tracked yet")?;
        } else {
            writeln!(
                f,
                "Applications: {} total ({})",
                self.applications.total,
                join_counts(&self.applications.by_status)
            )?;
            if !self.applications.by_decision.is_empty() {
                writeln!(f, "Decisions: {}", join_counts(&self.applications.by_decision))?;
            }
        }

        writeln!(
            f,
            "Tasks: {} total, {} pending, {} completed, {} urgent",
            self.tasks.total, self.tasks.pending, self.tasks.completed, self.tasks.urgent
        )?;

        if !self.deadlines.is_empty() {
            writeln!(f, "Upcoming deadlines:")?;
            for d in &self.deadlines {
                match &d.label {
                    Some(label) => writeln!(f, "- {}: {} ({})", d.title, d.due, label)?,
                    None => writeln!(f, "- {}: {}", d.title, d.due)?,
                }
            }
        }

        if !self.profile.fields.is_empty() {
            let fields = self
                .profile
                .fields
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "Profile: {fields}")?;
        }
        Ok(())
    }
}
