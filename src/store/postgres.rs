use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use super::{Store, StoreResult, PENDING_TASK_PREVIEW};
use crate::models::{
    CompletionCount, NewTask, NewUser, Task, TaskPatch, User, UserCredentials, UserWithStats,
};
use crate::query::{Pagination, TaskFilter, TaskSort};

const TASK_COLUMNS: &str =
    "id, title, description, is_completed, priority, user_id, created_at, updated_at";

/// PostgreSQL backend. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_task_filter(builder: &mut QueryBuilder<'_, Postgres>, user_id: i64, filter: &TaskFilter) {
    builder.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(done) = filter.is_completed {
        builder.push(" AND is_completed = ").push_bind(done);
    }
    if let Some(priority) = filter.priority {
        builder.push(" AND priority = ").push_bind(priority);
    }
    if let Some((start, end)) = filter.created_between {
        builder
            .push(" AND created_at BETWEEN ")
            .push_bind(start)
            .push(" AND ")
            .push_bind(end);
    }
    if let Some(search) = &filter.search {
        builder
            .push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
}

async fn insert_tasks(
    conn: &mut PgConnection,
    user_id: i64,
    tasks: Vec<NewTask>,
) -> Result<u64, sqlx::Error> {
    if tasks.is_empty() {
        return Ok(0);
    }
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO tasks (title, description, is_completed, priority, user_id) ");
    builder.push_values(tasks, |mut row, task| {
        row.push_bind(task.title)
            .push_bind(task.description)
            .push_bind(task.is_completed)
            .push_bind(task.priority)
            .push_bind(user_id);
    });
    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn register_user(
        &self,
        user: NewUser,
        welcome_tasks: Vec<NewTask>,
    ) -> StoreResult<(User, u64)> {
        let mut tx = self.pool.begin().await?;

        let created_user = sqlx::query_as::<_, User>(
            "INSERT INTO users (name, email, password_hash)
             VALUES ($1, $2, $3)
             RETURNING id, name, email, created_at",
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_one(&mut *tx)
        .await?;

        let created = insert_tasks(&mut *tx, created_user.id, welcome_tasks).await?;
        tx.commit().await?;

        Ok((created_user, created))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, name, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credentials)
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, name, email, created_at FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn list_users_with_stats(
        &self,
        page: Pagination,
    ) -> StoreResult<(Vec<UserWithStats>, i64)> {
        let users = sqlx::query_as::<_, UserWithStats>(
            "SELECT u.id, u.name, u.email, u.created_at,
                    (SELECT COUNT(*) FROM tasks t WHERE t.user_id = u.id) AS task_count,
                    ARRAY(
                        SELECT t.id FROM tasks t
                        WHERE t.user_id = u.id AND NOT t.is_completed
                        ORDER BY t.id
                        LIMIT $3
                    ) AS pending_task_ids
             FROM users u
             ORDER BY u.created_at DESC, u.id DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(page.limit)
        .bind(page.offset())
        .bind(PENDING_TASK_PREVIEW as i64)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok((users, total))
    }

    async fn create_task(&self, user_id: i64, task: NewTask) -> StoreResult<Task> {
        let sql = format!(
            "INSERT INTO tasks (title, description, is_completed, priority, user_id)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {}",
            TASK_COLUMNS
        );
        let created = sqlx::query_as::<_, Task>(&sql)
            .bind(task.title)
            .bind(task.description)
            .bind(task.is_completed)
            .bind(task.priority)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(created)
    }

    async fn create_tasks(&self, user_id: i64, tasks: Vec<NewTask>) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let created = insert_tasks(&mut *tx, user_id, tasks).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_task(&self, user_id: i64, id: i64) -> StoreResult<Option<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn list_tasks(
        &self,
        user_id: i64,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Pagination,
    ) -> StoreResult<(Vec<Task>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM tasks");
        push_task_filter(&mut count, user_id, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM tasks", TASK_COLUMNS));
        push_task_filter(&mut select, user_id, filter);
        // Column and direction come from closed enums, never from raw input.
        select.push(format!(
            " ORDER BY {col} {dir}, id {dir}",
            col = sort.field.column(),
            dir = sort.order.keyword()
        ));
        select
            .push(" LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let tasks = select
            .build_query_as::<Task>()
            .fetch_all(&self.pool)
            .await?;
        Ok((tasks, total))
    }

    async fn update_task(
        &self,
        user_id: i64,
        id: i64,
        patch: TaskPatch,
    ) -> StoreResult<Option<Task>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE tasks SET updated_at = NOW()");
        if let Some(title) = patch.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(is_completed) = patch.is_completed {
            builder.push(", is_completed = ").push_bind(is_completed);
        }
        if let Some(priority) = patch.priority {
            builder.push(", priority = ").push_bind(priority);
        }
        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(format!(" RETURNING {}", TASK_COLUMNS));

        let task = builder
            .build_query_as::<Task>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete_task(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn completion_stats(&self, user_id: i64) -> StoreResult<Vec<CompletionCount>> {
        let stats = sqlx::query_as::<_, CompletionCount>(
            "SELECT is_completed, COUNT(*) AS count
             FROM tasks WHERE user_id = $1
             GROUP BY is_completed
             ORDER BY is_completed",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn recent_tasks(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }

    async fn task_creation_times(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<DateTime<Utc>>> {
        let times = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT created_at FROM tasks
             WHERE user_id = $1 AND created_at >= $2
             ORDER BY created_at",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(times)
    }

    async fn search_tasks(&self, user_id: i64, query: &str, limit: i64) -> StoreResult<Vec<Task>> {
        let escaped = escape_like(query);
        let sql = format!(
            "SELECT {} FROM tasks
             WHERE user_id = $1 AND title ILIKE $2
             ORDER BY CASE
                        WHEN title ILIKE $3 THEN 1
                        WHEN title ILIKE $4 THEN 2
                        WHEN title ILIKE $2 THEN 3
                        ELSE 4
                      END,
                      created_at DESC, id DESC
             LIMIT $5",
            TASK_COLUMNS
        );
        let tasks = sqlx::query_as::<_, Task>(&sql)
            .bind(user_id)
            .bind(format!("%{}%", escaped))
            .bind(escaped.clone())
            .bind(format!("{}%", escaped))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::store::StoreError;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    async fn store() -> PgStore {
        dotenv::dotenv().ok();
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
        let store = PgStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn unique_email(tag: &str) -> String {
        format!("{}-{}@example.com", tag, uuid::Uuid::new_v4())
    }

    #[actix_rt::test]
    #[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
    async fn test_register_and_duplicate_email() {
        let store = store().await;
        let email = unique_email("dup");
        let new_user = NewUser {
            name: "Ann".into(),
            email: email.clone(),
            password_hash: "hash".into(),
        };

        let (user, created) = store
            .register_user(new_user.clone(), crate::models::welcome_tasks())
            .await
            .unwrap();
        assert_eq!(created, 3);
        assert_eq!(user.email, email);

        let err = store.register_user(new_user, vec![]).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[actix_rt::test]
    #[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
    async fn test_task_lifecycle_and_filters() {
        let store = store().await;
        let (user, _) = store
            .register_user(
                NewUser {
                    name: "Bob".into(),
                    email: unique_email("tasks"),
                    password_hash: "hash".into(),
                },
                vec![],
            )
            .await
            .unwrap();

        let task = store
            .create_task(user.id, NewTask::new("100% done", Priority::High))
            .await
            .unwrap();
        store
            .create_task(user.id, NewTask::new("Other", Priority::Low))
            .await
            .unwrap();

        let filter = TaskFilter {
            search: Some("100%".into()),
            ..Default::default()
        };
        let (tasks, total) = store
            .list_tasks(user.id, &filter, TaskSort::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tasks[0].id, task.id);

        let updated = store
            .update_task(
                user.id,
                task.id,
                TaskPatch {
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(updated.is_completed);
        assert!(updated.updated_at >= task.updated_at);

        assert!(store.delete_task(user.id, task.id).await.unwrap());
        assert!(!store.delete_task(user.id, task.id).await.unwrap());
    }
}
