use crate::{
    auth::AuthenticatedUser,
    error::{AppError, BatchFailure},
    models::{BulkTaskRequest, NewTask, TaskPatch, MAX_BULK_TASKS, TASK_FIELDS},
    query::{FieldSelection, TaskListQuery},
    store::Store,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

use super::users::FieldsQuery;

/// Retrieves a page of the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `status` (optional): `true`/`completed` or `false`/`pending`.
/// - `priority` (optional): `low`, `medium` or `high`.
/// - `date_range` (optional): `start,end` creation-time bounds.
/// - `search` (optional): case-insensitive substring of the title.
/// - `sort_by`, `sort_order` (optional): defaults to newest first.
/// - `page`, `limit` (optional): defaults to page 1 with 10 tasks.
/// - `fields` (optional): comma separated list of fields to return.
///
/// ## Responses:
/// - `200 OK`: `{ "tasks": [...], "pagination": {...} }`.
/// - `400 Bad Request`: If a filter value is invalid.
/// - `401 Unauthorized`: If the request lacks a valid session.
#[get("")]
pub async fn list_tasks(
    store: web::Data<dyn Store>,
    query: web::Query<TaskListQuery>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let filter = query.filter()?;
    let page = query.pagination();

    let (tasks, total) = store
        .list_tasks(user.id, &filter, query.sort(), page)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "tasks": query.fields().project_all(&tasks)?,
        "pagination": page.info(total),
    })))
}

/// Creates a new task for the authenticated user.
///
/// ## Responses:
/// - `201 Created`: Returns the newly created task.
/// - `400 Bad Request`: If the body is not valid JSON for a task.
/// - `422 Unprocessable Entity`: If title or description fail validation.
#[post("")]
pub async fn create_task(
    store: web::Data<dyn Store>,
    task_data: web::Json<NewTask>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let input = task_data.into_inner().normalize();
    input.validate()?;

    let task = store.create_task(user.id, input).await?;
    Ok(HttpResponse::Created().json(task))
}

/// Creates up to 100 tasks in one request.
///
/// Every entry is validated first; if any fails, nothing is stored and the
/// response lists the failing indexes.
#[post("/bulk")]
pub async fn create_tasks_bulk(
    store: web::Data<dyn Store>,
    bulk: web::Json<BulkTaskRequest>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let requested = bulk.into_inner().tasks;
    if requested.is_empty() {
        return Err(AppError::BadRequest(
            "Tasks array is required and must not be empty".into(),
        ));
    }
    if requested.len() > MAX_BULK_TASKS {
        return Err(AppError::BadRequest(format!(
            "Cannot create more than {} tasks at once",
            MAX_BULK_TASKS
        )));
    }

    let total_requested = requested.len();
    let mut valid = Vec::with_capacity(total_requested);
    let mut failures = Vec::new();
    for (index, entry) in requested.into_iter().enumerate() {
        let task = match serde_json::from_value::<NewTask>(entry) {
            Ok(task) => task.normalize(),
            Err(e) => {
                failures.push(BatchFailure {
                    index,
                    errors: e.to_string(),
                });
                continue;
            }
        };
        match task.validate() {
            Ok(()) => valid.push(task),
            Err(errors) => failures.push(BatchFailure {
                index,
                errors: errors.to_string(),
            }),
        }
    }
    if !failures.is_empty() {
        return Err(AppError::BatchRejected {
            failures,
            valid: valid.len(),
        });
    }

    let tasks_created = store.create_tasks(user.id, valid).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Successfully created {} tasks", tasks_created),
        "tasks_created": tasks_created,
        "total_requested": total_requested,
    })))
}

/// Retrieves one task. Tasks of other users answer 404.
#[get("/{id}")]
pub async fn get_task(
    store: web::Data<dyn Store>,
    task_id: web::Path<String>,
    query: web::Query<FieldsQuery>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = super::parse_id(&task_id, "Task")?;
    let task = store
        .get_task(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;

    let fields = FieldSelection::parse(query.fields.as_deref(), TASK_FIELDS);
    Ok(HttpResponse::Ok().json(fields.project(&task)?))
}

/// Partially updates a task. At least one field must be present.
#[patch("/{id}")]
pub async fn update_task(
    store: web::Data<dyn Store>,
    task_id: web::Path<String>,
    task_data: web::Json<TaskPatch>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = super::parse_id(&task_id, "Task")?;
    let patch = task_data.into_inner().normalize();
    if patch.is_empty() {
        return Err(AppError::BadRequest("No fields to update".into()));
    }
    patch.validate()?;

    let task = store
        .update_task(user.id, id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".into()))?;
    Ok(HttpResponse::Ok().json(task))
}

#[delete("/{id}")]
pub async fn delete_task(
    store: web::Data<dyn Store>,
    task_id: web::Path<String>,
    user: AuthenticatedUser,
) -> Result<impl Responder, AppError> {
    let id = super::parse_id(&task_id, "Task")?;
    if !store.delete_task(user.id, id).await? {
        return Err(AppError::NotFound("Task not found".into()));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted successfully" })))
}
