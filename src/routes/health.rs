use std::time::Instant;

use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;

use crate::error::AppError;
use crate::store::Store;

/// Process facts reported by the health endpoints.
pub struct HealthState {
    pub started: Instant,
    pub environment: String,
}

impl HealthState {
    pub fn new(environment: &str) -> Self {
        Self {
            started: Instant::now(),
            environment: environment.to_string(),
        }
    }
}

/// Health check endpoint
///
/// Returns the current status of the API, a timestamp and the process uptime.
#[get("")]
pub async fn health(state: web::Data<HealthState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "uptime_secs": state.started.elapsed().as_secs(),
        "environment": state.environment,
    }))
}

/// Liveness probe: the process is up and serving requests.
#[get("/live")]
pub async fn live() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "alive" }))
}

/// Readiness probe: the store answers. 503 otherwise.
#[get("/ready")]
pub async fn ready(store: web::Data<dyn Store>) -> Result<impl Responder, AppError> {
    if let Err(e) = store.ping().await {
        log::error!("readiness check failed: {}", e);
        return Err(AppError::ServiceUnavailable("Database is not reachable".into()));
    }
    Ok(HttpResponse::Ok().json(json!({ "status": "ready" })))
}
