use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Store, StoreError, StoreResult, DUPLICATE_EMAIL, PENDING_TASK_PREVIEW};
use crate::analytics::rank_search;
use crate::models::{
    CompletionCount, NewTask, NewUser, Task, TaskPatch, User, UserCredentials, UserWithStats,
};
use crate::query::{Pagination, TaskFilter, TaskSort};

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    tasks: HashMap<i64, Task>,
    next_user_id: i64,
    next_task_id: i64,
}

impl Tables {
    fn insert_task(&mut self, user_id: i64, input: NewTask, now: DateTime<Utc>) -> Task {
        self.next_task_id += 1;
        let task = Task {
            id: self.next_task_id,
            title: input.title,
            description: input.description,
            is_completed: input.is_completed,
            priority: input.priority,
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(task.id, task.clone());
        task
    }

    fn owned_tasks(&self, user_id: i64) -> impl Iterator<Item = &Task> {
        self.tasks.values().filter(move |t| t.user_id == user_id)
    }
}

/// In-process store. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn page_of<T>(items: Vec<T>, page: Pagination) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn register_user(
        &self,
        user: NewUser,
        welcome_tasks: Vec<NewTask>,
    ) -> StoreResult<(User, u64)> {
        let mut tables = self.tables.write();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(DUPLICATE_EMAIL.to_string()));
        }

        let now = Utc::now();
        tables.next_user_id += 1;
        let credentials = UserCredentials {
            id: tables.next_user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
        };
        tables.users.push(credentials.clone());

        let created = welcome_tasks.len() as u64;
        for task in welcome_tasks {
            tables.insert_task(credentials.id, task, now);
        }
        Ok((credentials.into(), created))
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<UserCredentials>> {
        let tables = self.tables.read();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, id: i64) -> StoreResult<Option<User>> {
        let tables = self.tables.read();
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(User::from))
    }

    async fn list_users_with_stats(
        &self,
        page: Pagination,
    ) -> StoreResult<(Vec<UserWithStats>, i64)> {
        let tables = self.tables.read();
        let mut users: Vec<&UserCredentials> = tables.users.iter().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = users.len() as i64;

        let listed = page_of(users, page)
            .into_iter()
            .map(|user| {
                let mut pending: Vec<i64> = tables
                    .owned_tasks(user.id)
                    .filter(|t| !t.is_completed)
                    .map(|t| t.id)
                    .collect();
                pending.sort_unstable();
                pending.truncate(PENDING_TASK_PREVIEW);

                UserWithStats {
                    id: user.id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    created_at: user.created_at,
                    task_count: tables.owned_tasks(user.id).count() as i64,
                    pending_task_ids: pending,
                }
            })
            .collect();
        Ok((listed, total))
    }

    async fn create_task(&self, user_id: i64, task: NewTask) -> StoreResult<Task> {
        let mut tables = self.tables.write();
        Ok(tables.insert_task(user_id, task, Utc::now()))
    }

    async fn create_tasks(&self, user_id: i64, tasks: Vec<NewTask>) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        let created = tasks.len() as u64;
        for task in tasks {
            tables.insert_task(user_id, task, now);
        }
        Ok(created)
    }

    async fn get_task(&self, user_id: i64, id: i64) -> StoreResult<Option<Task>> {
        let tables = self.tables.read();
        Ok(tables
            .tasks
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn list_tasks(
        &self,
        user_id: i64,
        filter: &TaskFilter,
        sort: TaskSort,
        page: Pagination,
    ) -> StoreResult<(Vec<Task>, i64)> {
        let tables = self.tables.read();
        let mut matching: Vec<Task> = tables
            .owned_tasks(user_id)
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        matching.sort_by(|a, b| sort.compare(a, b));
        let total = matching.len() as i64;
        Ok((page_of(matching, page), total))
    }

    async fn update_task(
        &self,
        user_id: i64,
        id: i64,
        patch: TaskPatch,
    ) -> StoreResult<Option<Task>> {
        let mut tables = self.tables.write();
        match tables.tasks.get_mut(&id) {
            Some(task) if task.user_id == user_id => {
                patch.apply(task, Utc::now());
                Ok(Some(task.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_task(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let owned = tables
            .tasks
            .get(&id)
            .map_or(false, |t| t.user_id == user_id);
        if owned {
            tables.tasks.remove(&id);
        }
        Ok(owned)
    }

    async fn completion_stats(&self, user_id: i64) -> StoreResult<Vec<CompletionCount>> {
        let tables = self.tables.read();
        let (mut open, mut done) = (0, 0);
        for task in tables.owned_tasks(user_id) {
            if task.is_completed {
                done += 1;
            } else {
                open += 1;
            }
        }

        let stats = [(false, open), (true, done)]
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(is_completed, count)| CompletionCount {
                is_completed,
                count,
            })
            .collect();
        Ok(stats)
    }

    async fn recent_tasks(&self, user_id: i64, limit: i64) -> StoreResult<Vec<Task>> {
        let tables = self.tables.read();
        let mut tasks: Vec<Task> = tables.owned_tasks(user_id).cloned().collect();
        tasks.sort_by(|a, b| TaskSort::default().compare(a, b));
        tasks.truncate(limit.max(0) as usize);
        Ok(tasks)
    }

    async fn task_creation_times(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<DateTime<Utc>>> {
        let tables = self.tables.read();
        let mut times: Vec<DateTime<Utc>> = tables
            .owned_tasks(user_id)
            .map(|t| t.created_at)
            .filter(|created| *created >= since)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn search_tasks(&self, user_id: i64, query: &str, limit: i64) -> StoreResult<Vec<Task>> {
        let needle = query.to_lowercase();
        let hits: Vec<Task> = {
            let tables = self.tables.read();
            tables
                .owned_tasks(user_id)
                .filter(|t| t.title.to_lowercase().contains(&needle))
                .cloned()
                .collect()
        };
        let mut ranked = rank_search(hits, query);
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use pretty_assertions::assert_eq;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ann".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    async fn seeded() -> (MemoryStore, i64) {
        let store = MemoryStore::new();
        let (user, created) = store
            .register_user(new_user("ann@example.com"), crate::models::welcome_tasks())
            .await
            .unwrap();
        assert_eq!(created, 3);
        (store, user.id)
    }

    #[actix_rt::test]
    async fn test_register_assigns_ids_and_rejects_duplicates() {
        let (store, user_id) = seeded().await;
        assert_eq!(user_id, 1);

        let err = store
            .register_user(new_user("ann@example.com"), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(msg) if msg == DUPLICATE_EMAIL));

        let found = store.find_credentials("ann@example.com").await.unwrap();
        assert_eq!(found.map(|c| c.password_hash), Some("hash".to_string()));
        assert!(store.find_user(99).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_tasks_are_scoped_to_owner() {
        let (store, ann) = seeded().await;
        let (bob, _) = store
            .register_user(new_user("bob@example.com"), vec![])
            .await
            .unwrap();

        let task = store
            .create_task(ann, NewTask::new("Private", Priority::Low))
            .await
            .unwrap();

        assert!(store.get_task(bob.id, task.id).await.unwrap().is_none());
        assert!(store
            .update_task(bob.id, task.id, TaskPatch::default())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_task(bob.id, task.id).await.unwrap());
        assert!(store.delete_task(ann, task.id).await.unwrap());
        assert!(store.get_task(ann, task.id).await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_list_filters_sorts_and_pages() {
        let (store, ann) = seeded().await;
        let filter = TaskFilter {
            priority: Some(Priority::High),
            ..Default::default()
        };
        let (tasks, total) = store
            .list_tasks(ann, &filter, TaskSort::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(tasks[0].title, "Complete your profile");

        let sort = TaskSort::from_raw(Some("title"), Some("asc"));
        let (tasks, total) = store
            .list_tasks(
                ann,
                &TaskFilter::default(),
                sort,
                Pagination { page: 2, limit: 2 },
            )
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Explore the app features");
    }

    #[actix_rt::test]
    async fn test_users_with_stats() {
        let (store, ann) = seeded().await;
        store
            .update_task(
                ann,
                1,
                TaskPatch {
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let (users, total) = store
            .list_users_with_stats(Pagination::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].task_count, 3);
        assert_eq!(users[0].pending_task_ids, vec![2, 3]);

        let stats = store.completion_stats(ann).await.unwrap();
        assert_eq!(
            stats,
            vec![
                CompletionCount {
                    is_completed: false,
                    count: 2
                },
                CompletionCount {
                    is_completed: true,
                    count: 1
                },
            ]
        );
    }

    #[actix_rt::test]
    async fn test_search_ranks_exact_before_partial() {
        let (store, ann) = seeded().await;
        store
            .create_task(ann, NewTask::new("Profile", Priority::Low))
            .await
            .unwrap();

        let hits = store.search_tasks(ann, "profile", 10).await.unwrap();
        let titles: Vec<_> = hits.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Profile", "Complete your profile"]);

        assert!(store.search_tasks(ann, "zzz", 10).await.unwrap().is_empty());
    }
}
