//! Productivity analytics over a user's tasks.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{CompletionCount, Task, User};
use crate::store::Store;

/// Window covered by `weekly_progress`.
pub const PROGRESS_WINDOW_DAYS: i64 = 28;
/// Number of tasks listed under `recent_tasks`.
pub const RECENT_TASKS: i64 = 10;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklyCount {
    /// Sunday that opens the week, `YYYY-MM-DD`.
    pub week_start: String,
    pub count: i64,
}

/// A task listed together with its owner's name.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OwnedTask {
    #[serde(flatten)]
    pub task: Task,
    pub user_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserAnalytics {
    pub task_stats: Vec<CompletionCount>,
    pub recent_tasks: Vec<OwnedTask>,
    pub weekly_progress: Vec<WeeklyCount>,
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Buckets creation times into Sunday-based UTC weeks, oldest week first.
pub fn weekly_progress(times: &[DateTime<Utc>]) -> Vec<WeeklyCount> {
    let mut weeks: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for time in times {
        *weeks.entry(week_start(time.date_naive())).or_default() += 1;
    }
    weeks
        .into_iter()
        .map(|(start, count)| WeeklyCount {
            week_start: start.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect()
}

pub fn with_owner(tasks: Vec<Task>, user_name: &str) -> Vec<OwnedTask> {
    tasks
        .into_iter()
        .map(|task| OwnedTask {
            task,
            user_name: user_name.to_string(),
        })
        .collect()
}

/// 1 for an exact title match, 2 for a prefix, 3 for a substring, 4 otherwise.
/// Comparison ignores case. Search hits always contain the query, so they
/// never rank 4.
pub fn search_rank(title: &str, query: &str) -> u8 {
    let title = title.to_lowercase();
    let query = query.to_lowercase();
    if title == query {
        1
    } else if title.starts_with(&query) {
        2
    } else if title.contains(&query) {
        3
    } else {
        4
    }
}

/// Orders search hits by rank, then newest first.
pub fn rank_search(mut tasks: Vec<Task>, query: &str) -> Vec<Task> {
    tasks.sort_by(|a, b| {
        search_rank(&a.title, query)
            .cmp(&search_rank(&b.title, query))
            .then(b.created_at.cmp(&a.created_at))
            .then(b.id.cmp(&a.id))
    });
    tasks
}

pub async fn user_analytics(
    store: &dyn Store,
    user: &User,
    now: DateTime<Utc>,
) -> Result<UserAnalytics, AppError> {
    let task_stats = store.completion_stats(user.id).await?;

    let recent_tasks = with_owner(store.recent_tasks(user.id, RECENT_TASKS).await?, &user.name);

    let since = now - Duration::days(PROGRESS_WINDOW_DAYS);
    let times = store.task_creation_times(user.id, since).await?;

    Ok(UserAnalytics {
        task_stats,
        recent_tasks,
        weekly_progress: weekly_progress(&times),
    })
}
