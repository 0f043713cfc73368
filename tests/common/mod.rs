#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{http::header, test, web, App};
use serde_json::{json, Value};
use taskhub::auth::{AuthService, CSRF_HEADER, SESSION_COOKIE};
use taskhub::routes::{self, health::HealthState};
use taskhub::security::{self, RateLimiter};
use taskhub::store::{MemoryStore, Store};

pub const SECRET: &str = "integration-test-secret";
pub const PASSWORD: &str = "Pa$$word20";

pub fn auth_service() -> AuthService {
    // Low bcrypt cost keeps the suite fast.
    AuthService::new(SECRET, Duration::from_secs(3600), false, 4)
}

pub async fn init_app_with(
    store: MemoryStore,
    limiter: RateLimiter,
) -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    let store: Arc<dyn Store> = Arc::new(store);
    test::init_service(
        App::new()
            .app_data(web::Data::from(store))
            .app_data(web::Data::new(auth_service()))
            .app_data(web::Data::new(HealthState::new("test")))
            .app_data(web::Data::new(limiter))
            .app_data(routes::json_config(64 * 1024))
            .app_data(routes::query_config())
            .app_data(routes::path_config())
            .wrap(security::cors(&["http://localhost:3000".to_string()]))
            .wrap(security::security_headers())
            .wrap(Logger::default())
            .configure(routes::config)
            .default_service(web::route().to(routes::not_found)),
    )
    .await
}

pub async fn init_app() -> impl Service<
    actix_http::Request,
    Response = ServiceResponse<impl MessageBody>,
    Error = actix_web::Error,
> {
    init_app_with(
        MemoryStore::new(),
        RateLimiter::new(10_000, Duration::from_secs(60)),
    )
    .await
}

/// A registered user and the session handed out at registration.
pub struct TestUser {
    pub id: i64,
    pub token: String,
    pub csrf_token: String,
}

impl TestUser {
    pub fn bearer(&self) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", self.token))
    }

    pub fn cookie(&self) -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, self.token.clone())
    }

    pub fn csrf(&self) -> (&'static str, String) {
        (CSRF_HEADER, self.csrf_token.clone())
    }
}

pub async fn register_user(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    name: &str,
    email: &str,
) -> Result<TestUser, String> {
    let req = test::TestRequest::post()
        .uri("/api/users/register")
        .set_json(&json!({
            "name": name,
            "email": email,
            "password": PASSWORD
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;

    if !status.is_success() {
        return Err(format!(
            "Failed to register user. Status: {}. Body: {}",
            status,
            String::from_utf8_lossy(&bytes)
        ));
    }
    let body: Value = serde_json::from_slice(&bytes)
        .map_err(|e| format!("Failed to parse registration response: {}", e))?;

    Ok(TestUser {
        id: body["user"]["id"].as_i64().ok_or("missing user id")?,
        token: body["token"].as_str().ok_or("missing token")?.to_string(),
        csrf_token: body["csrf_token"]
            .as_str()
            .ok_or("missing csrf token")?
            .to_string(),
    })
}

/// Creates a task over the API with bearer auth and returns its JSON.
pub async fn create_task(
    app: &impl Service<
        actix_http::Request,
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
    >,
    user: &TestUser,
    payload: Value,
) -> Value {
    let req = test::TestRequest::post()
        .uri("/api/tasks")
        .insert_header(user.bearer())
        .set_json(&payload)
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
    test::read_body_json(resp).await
}
