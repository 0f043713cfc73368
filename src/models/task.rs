use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Fields a client may request through the `fields` query parameter.
pub const TASK_FIELDS: &[&str] = &[
    "id",
    "title",
    "description",
    "is_completed",
    "priority",
    "user_id",
    "created_at",
    "updated_at",
];

/// Largest number of tasks accepted by a single bulk request.
pub const MAX_BULK_TASKS: usize = 100;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum; variants are declared in ascending order.
#[derive(
    Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type,
)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!(
                "Priority must be low, medium, or high (got {:?})",
                other
            )),
        }
    }
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub priority: Priority,
    /// Owner of the task.
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTask {
    /// Must be between 1 and 255 characters after trimming.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title is required and must be less than 255 characters"
    ))]
    pub title: String,

    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub is_completed: bool,

    #[serde(default)]
    pub priority: Priority,
}

impl NewTask {
    pub fn new(title: &str, priority: Priority) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            is_completed: false,
            priority,
        }
    }

    /// Trims the title and description. Call before `validate`.
    pub fn normalize(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }
}

/// Partial update for an existing task. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TaskPatch {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: Option<String>,

    #[validate(length(max = 1000, message = "Description must be less than 1000 characters"))]
    pub description: Option<String>,

    pub is_completed: Option<bool>,

    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn normalize(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.is_completed.is_none()
            && self.priority.is_none()
    }

    /// Applies the patch in place and bumps `updated_at`.
    pub fn apply(self, task: &mut Task, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = Some(description);
        }
        if let Some(is_completed) = self.is_completed {
            task.is_completed = is_completed;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        task.updated_at = now;
    }
}

/// Payload for `POST /api/tasks/bulk`.
///
/// Entries stay raw JSON so a malformed one is reported by index instead of
/// failing the whole body.
#[derive(Debug, Deserialize)]
pub struct BulkTaskRequest {
    #[serde(default)]
    pub tasks: Vec<serde_json::Value>,
}

/// Number of tasks per completion state, as reported by analytics.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct CompletionCount {
    pub is_completed: bool,
    pub count: i64,
}

/// The tasks every new account starts with.
pub fn welcome_tasks() -> Vec<NewTask> {
    vec![
        NewTask::new("Complete your profile", Priority::High),
        NewTask::new("Add your first task", Priority::Medium),
        NewTask::new("Explore the app features", Priority::Low),
    ]
}
