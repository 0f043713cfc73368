//! Query-string handling for list endpoints: pagination, task filters,
//! sorting and sparse field selection.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::models::{Priority, Task};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A normalised page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Parses raw query values. Anything unusable falls back to the defaults
    /// instead of failing the request.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| (1..=MAX_PAGE_SIZE).contains(l))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn info(&self, total: i64) -> PageInfo {
        PageInfo {
            page: self.page,
            limit: self.limit,
            total,
            pages: (total + self.limit - 1) / self.limit,
            has_next: self.page.saturating_mul(self.limit) < total,
            has_prev: self.page > 1,
        }
    }
}

/// Pagination metadata returned next to every paged result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Raw query parameters of `GET /api/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub date_range: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    pub fields: Option<String>,
}

impl TaskListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_raw(self.page.as_deref(), self.limit.as_deref())
    }

    pub fn filter(&self) -> Result<TaskFilter, AppError> {
        let is_completed = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some("true") | Some("completed") => Some(true),
            Some("false") | Some("pending") => Some(false),
            Some(other) => {
                return Err(AppError::BadRequest(format!(
                    "status must be true or false (got {:?})",
                    other
                )))
            }
        };

        let priority = match self.priority.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Priority>().map_err(AppError::BadRequest)?),
        };

        let created_between = match self.date_range.as_deref() {
            Some(raw) => parse_date_range(raw)?,
            None => None,
        };

        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(TaskFilter {
            is_completed,
            priority,
            created_between,
            search,
        })
    }

    pub fn sort(&self) -> TaskSort {
        TaskSort::from_raw(self.sort_by.as_deref(), self.sort_order.as_deref())
    }

    pub fn fields(&self) -> FieldSelection {
        FieldSelection::parse(self.fields.as_deref(), crate::models::TASK_FIELDS)
    }
}

/// Conditions applied on top of the owner scope when listing tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub is_completed: Option<bool>,
    pub priority: Option<Priority>,
    /// Inclusive creation-time bounds.
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Case-insensitive substring of the title.
    pub search: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(done) = self.is_completed {
            if task.is_completed != done {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some((start, end)) = self.created_between {
            if task.created_at < start || task.created_at > end {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !task.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Accepts `start,end`; each bound is RFC 3339 or `YYYY-MM-DD`. A date-only
/// end covers that whole day. With a missing bound the range is ignored.
fn parse_date_range(raw: &str) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, AppError> {
    let mut parts = raw.splitn(2, ',').map(str::trim);
    let (start, end) = match (parts.next(), parts.next()) {
        (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => (start, end),
        _ => return Ok(None),
    };

    let start = parse_bound(start, false)?;
    let end = parse_bound(end, true)?;
    if start > end {
        return Err(AppError::BadRequest(
            "date_range start must not be after its end".into(),
        ));
    }
    Ok(Some((start, end)))
}

fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, AppError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(instant.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AppError::BadRequest(format!(
            "date_range bounds must be YYYY-MM-DD or RFC 3339 (got {:?})",
            raw
        ))
    })?;
    let start = date.and_time(NaiveTime::MIN).and_utc();
    Ok(if end_of_day {
        start + Duration::days(1) - Duration::microseconds(1)
    } else {
        start
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Title,
    IsCompleted,
    Priority,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::IsCompleted => "is_completed",
            SortField::Priority => "priority",
            SortField::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for TaskSort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

impl TaskSort {
    /// Unknown sort fields fall back to `created_at`; anything but `asc` sorts descending.
    pub fn from_raw(sort_by: Option<&str>, sort_order: Option<&str>) -> Self {
        let field = match sort_by.map(str::trim) {
            Some("title") => SortField::Title,
            Some("is_completed") => SortField::IsCompleted,
            Some("priority") => SortField::Priority,
            _ => SortField::CreatedAt,
        };
        let order = match sort_order.map(str::trim) {
            Some(o) if o.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };
        Self { field, order }
    }

    /// Orders two tasks; ties are broken by id in the same direction.
    pub fn compare(&self, a: &Task, b: &Task) -> std::cmp::Ordering {
        let primary = match self.field {
            SortField::Title => a.title.cmp(&b.title),
            SortField::IsCompleted => a.is_completed.cmp(&b.is_completed),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let ordering = primary.then(a.id.cmp(&b.id));
        match self.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Sparse fieldset requested with `fields=a,b,c`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    All,
    Only(Vec<&'static str>),
}

impl FieldSelection {
    /// Keeps only names present in `allowed`. When none survive, the full record is returned.
    pub fn parse(raw: Option<&str>, allowed: &[&'static str]) -> Self {
        let Some(raw) = raw else {
            return FieldSelection::All;
        };
        let mut picked: Vec<&'static str> = Vec::new();
        for name in raw.split(',').map(str::trim) {
            if let Some(field) = allowed.iter().find(|f| **f == name) {
                if !picked.contains(field) {
                    picked.push(*field);
                }
            }
        }
        if picked.is_empty() {
            FieldSelection::All
        } else {
            FieldSelection::Only(picked)
        }
    }

    pub fn project<T: Serialize>(&self, record: &T) -> Result<Value, AppError> {
        let value = serde_json::to_value(record)
            .map_err(|e| AppError::InternalServerError(format!("Serialization failed: {}", e)))?;
        Ok(match (self, value) {
            (FieldSelection::Only(fields), Value::Object(mut map)) => {
                map.retain(|key, _| fields.iter().any(|field| *field == key.as_str()));
                Value::Object(map)
            }
            (_, value) => value,
        })
    }

    pub fn project_all<T: Serialize>(&self, records: &[T]) -> Result<Vec<Value>, AppError> {
        records.iter().map(|r| self.project(r)).collect()
    }
}
