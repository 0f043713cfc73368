use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{
    analytics,
    auth::AuthenticatedUser,
    error::AppError,
    query::Pagination,
    store::Store,
};

pub const DEFAULT_SEARCH_LIMIT: i64 = 20;
pub const MAX_SEARCH_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

/// Task statistics, recent tasks and weekly progress for one user.
/// Only the user themselves may read them.
#[get("/users/{id}")]
pub async fn user_analytics(
    store: web::Data<dyn Store>,
    path: web::Path<String>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = super::parse_id(&path, "User")?;
    if id != user.id {
        return Err(AppError::Forbidden(
            "You can only view your own analytics".into(),
        ));
    }

    let account = store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    let report = analytics::user_analytics(store.get_ref(), &account, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Paged list of users, newest first, with their task counts.
#[get("/users")]
pub async fn users_with_stats(
    store: web::Data<dyn Store>,
    query: web::Query<PageQuery>,
    _user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let page = Pagination::from_raw(query.page.as_deref(), query.limit.as_deref());
    let (users, total) = store.list_users_with_stats(page).await?;
    Ok(HttpResponse::Ok().json(json!({
        "users": users,
        "pagination": page.info(total),
    })))
}

/// Ranked title search over the caller's tasks.
#[get("/search")]
pub async fn search_tasks(
    store: web::Data<dyn Store>,
    query: web::Query<SearchQuery>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.chars().count() < 2 {
        return Err(AppError::BadRequest(
            "Search query must be at least 2 characters long".into(),
        ));
    }
    let limit = search_limit(query.limit.as_deref());

    let results = analytics::with_owner(store.search_tasks(user.id, q, limit).await?, &user.name);
    Ok(HttpResponse::Ok().json(json!({
        "count": results.len(),
        "query": q,
        "results": results,
    })))
}

fn search_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|l| l.trim().parse::<i64>().ok())
        .map(|l| l.clamp(1, MAX_SEARCH_LIMIT))
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
}
