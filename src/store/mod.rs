//! Persistence behind the handlers.
//!
//! Routes only talk to the [`Store`] trait. [`PgStore`] is the production
//! backend; [`MemoryStore`] keeps everything in process and backs the
//! integration tests and database-less development runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    CompletionCount, NewTask, NewUser, Task, TaskPatch, User, UserCredentials, UserWithStats,
};
use crate::query::{Pagination, TaskFilter, TaskSort};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Message reported when an email is registered twice.
pub const DUPLICATE_EMAIL: &str = "User with this email already exists";

/// Number of open task ids listed per user in [`Store::list_users_with_stats`].
pub const PENDING_TASK_PREVIEW: usize = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(DUPLICATE_EMAIL.to_string())
            }
            _ => StoreError::Backend(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend(format!("migration failed: {}", error))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Every task operation is scoped to `user_id`; a task owned by someone else
/// behaves exactly like a missing one.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;

    /// Creates the user and their starter tasks atomically.
    /// Returns the user and the number of tasks created.
    async fn register_user(
        &self,
        user: NewUser,
        welcome_tasks: Vec<NewTask>,
    ) -> StoreResult<(User, u64)>;

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>>;

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;

    /// Newest users first, each with a task count and a preview of open task ids.
    async fn list_users_with_stats(
        &self,
        page: Pagination,
    ) -> StoreResult<(Vec<UserWithStats>, i64)>;

    async fn create_task(&self, user_id: i64, task: NewTask) -> StoreResult<Task>;

    /// Inserts all tasks or none.
    async fn create_tasks(&self, user_id: i64, tasks: Vec<NewTask>) -> StoreResult<u64>;

    async fn get_task(&self, user_id: i64, id: i64) -> StoreResult<Option<Task>>;

    /// Returns one page of matching tasks and the total number of matches.
    async fn list_tasks(
        &self,
        user_id: i64,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Pagination,
    ) -> StoreResult<(Vec<Task>, i64)>;

    async fn update_task(
        &self,
        user_id: i64,
        id: i64,
        patch: TaskPatch,
    ) -> StoreResult<Option<Task>>;

    async fn delete_task(&self, user_id: i64, id: i64) -> StoreResult<bool>;

    async fn completion_stats(&self, user_id: i64) -> StoreResult<Vec<CompletionCount>>;

    /// Latest `limit` tasks, newest first.
    async fn recent_tasks(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Task>>;

    async fn task_creation_times(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<DateTime<Utc>>>;

    /// Tasks whose title contains `query` (case-insensitive), best matches first.
    async fn search_tasks(&self, user_id: i64, query: &str, limit: i64) -> StoreResult<Vec<Task>>;
}
