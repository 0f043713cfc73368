pub mod analytics;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::{middleware::from_fn, web, HttpResponse, ResponseError};

use crate::auth::AuthMiddleware;
use crate::error::AppError;
use crate::security::rate_limit_middleware;

/// Mounts every route. `/health` is public; everything under `/api` is rate
/// limited and, apart from register, logon and logoff, requires a session.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/health")
            .service(health::health)
            .service(health::live)
            .service(health::ready),
    )
    .service(
        web::scope("/api")
            .wrap(from_fn(rate_limit_middleware))
            .service(
                web::scope("/users")
                    .service(users::register)
                    .service(users::logon)
                    .service(users::logoff)
                    .service(
                        web::resource("/{id}")
                            .wrap(AuthMiddleware)
                            .route(web::get().to(users::get_user)),
                    ),
            )
            .service(
                web::scope("/tasks")
                    .wrap(AuthMiddleware)
                    .service(tasks::list_tasks)
                    .service(tasks::create_task)
                    .service(tasks::create_tasks_bulk)
                    .service(tasks::get_task)
                    .service(tasks::update_task)
                    .service(tasks::delete_task),
            )
            .service(
                web::scope("/analytics")
                    .wrap(AuthMiddleware)
                    .service(analytics::users_with_stats)
                    .service(analytics::user_analytics)
                    .service(analytics::search_tasks),
            ),
    );
}

/// JSON bodies above `limit` bytes or failing to deserialize are rejected with 400.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid JSON body: {}", err)).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    })
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid path: {}", err)).into())
}

/// Fallback for unmatched routes.
pub async fn not_found() -> HttpResponse {
    AppError::NotFound("Route not found".into()).error_response()
}

/// Parses a positive numeric id from a path segment.
pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= 1)
        .ok_or_else(|| AppError::BadRequest(format!("{} ID must be a positive integer", entity)))
}
