//! Project task models

use crate::error::AppError;
use crate::transitions::{TransitionMode, TransitionRule, TransitionTable};
use crate::AppResult;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task board column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Backlog,
    Todo,
    InProgress,
    InReview,
    Blocked,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Backlog => write!(f, "backlog"),
            TaskStatus::Todo => write!(f, "todo"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::InReview => write!(f, "in_review"),
            TaskStatus::Blocked => write!(f, "blocked"),
            TaskStatus::Done => write!(f, "done"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Task,
    Bug,
    Story,
    Epic,
    Subtask,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEffect {
    /// Record started_at unless already recorded
    StampStarted,
    /// Record completed_at unless already recorded
    StampCompleted,
}

/// Tasks move freely between columns; only starting and finishing stamp times.
pub static TASK_TRANSITIONS: TransitionTable<TaskStatus, TaskEffect> = TransitionTable::new(
    "task",
    TransitionMode::Open,
    &[
        TransitionRule {
            from: &[],
            to: TaskStatus::InProgress,
            effects: &[TaskEffect::StampStarted],
        },
        TransitionRule {
            from: &[],
            to: TaskStatus::Done,
            effects: &[TaskEffect::StampCompleted],
        },
    ],
);

/// Key of the `ordinal`-th task (1-based) in a project, e.g. `PRJ-7`
pub fn task_key(project_code: &str, ordinal: i64) -> AppResult<String> {
    let code = project_code.trim();
    if code.is_empty() {
        return Err(AppError::invalid("Project code must not be empty"));
    }
    if ordinal < 1 {
        return Err(AppError::InvalidInput(format!(
            "Task ordinal must be at least 1, got {}",
            ordinal
        )));
    }
    Ok(format!("{}-{}", code, ordinal))
}

/// Task entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i32,
    pub project_id: i32,
    pub parent_task_id: Option<i32>,
    pub task_key: String,
    pub title: String,
    pub description: Option<String>,
    pub task_type: TaskType,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee_id: Option<i32>,
    pub created_by_id: i32,
    pub estimated_hours: Option<Decimal>,
    pub logged_hours: Decimal,
    pub due_date: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial task update; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_type: Option<TaskType>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<i32>,
    pub estimated_hours: Option<Decimal>,
    pub logged_hours: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub position: Option<i32>,
}

impl Task {
    pub fn apply_update(
        &mut self,
        update: TaskUpdate,
        now: DateTime<Utc>,
    ) -> AppResult<&'static [TaskEffect]> {
        if let Some(hours) = update.logged_hours {
            if hours < Decimal::ZERO {
                return Err(AppError::InvalidInput(format!(
                    "Logged hours must not be negative, got {}",
                    hours
                )));
            }
        }
        let effects: &'static [TaskEffect] = match update.status {
            Some(to) => TASK_TRANSITIONS.resolve(self.status, to)?,
            None => &[],
        };

        if let Some(v) = update.title {
            self.title = v;
        }
        if let Some(v) = update.description {
            self.description = Some(v);
        }
        if let Some(v) = update.task_type {
            self.task_type = v;
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        if let Some(v) = update.priority {
            self.priority = v;
        }
        if let Some(v) = update.assignee_id {
            self.assignee_id = Some(v);
        }
        if let Some(v) = update.estimated_hours {
            self.estimated_hours = Some(v);
        }
        if let Some(v) = update.logged_hours {
            self.logged_hours = v;
        }
        if let Some(v) = update.due_date {
            self.due_date = Some(v);
        }
        if let Some(v) = update.position {
            self.position = v;
        }

        for effect in effects {
            match effect {
                TaskEffect::StampStarted => {
                    self.started_at.get_or_insert(now);
                }
                TaskEffect::StampCompleted => {
                    self.completed_at.get_or_insert(now);
                }
            }
        }
        self.updated_at = Some(now);

        Ok(effects)
    }
}
