//! Request hardening shared by every route: a per-client rate limiter,
//! default security headers and the CORS policy.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_cors::Cors;
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::{header, Uri},
    middleware::{DefaultHeaders, Next},
    web, Error, ResponseError,
};
use dashmap::DashMap;

use crate::error::AppError;

/// Sliding-window request counter keyed by client address.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<DashMap<String, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records a request from `client` and reports whether it is within budget.
    /// Rejected requests are not recorded.
    pub fn check(&self, client: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.requests.entry(client.to_string()).or_default();
        entry.retain(|&seen| now.duration_since(seen) < self.window);

        if entry.len() >= self.max_requests {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drops expired timestamps and forgets idle clients.
    pub fn cleanup_old_entries(&self) {
        let now = Instant::now();
        self.requests.retain(|_, seen| {
            seen.retain(|&at| now.duration_since(at) < self.window);
            !seen.is_empty()
        });
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

/// `from_fn` middleware enforcing the shared [`RateLimiter`].
pub async fn rate_limit_middleware<B>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error>
where
    B: MessageBody + 'static,
{
    let client = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    let allowed = match req.app_data::<web::Data<RateLimiter>>() {
        Some(limiter) => limiter.check(&client),
        None => true,
    };

    if !allowed {
        log::warn!("Rate limit exceeded for client: {}", client);
        let response =
            AppError::TooManyRequests("Too many requests, please try again later".into())
                .error_response();
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(ServiceResponse::map_into_left_body)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .add((header::X_FRAME_OPTIONS, "DENY"))
        .add((header::REFERRER_POLICY, "no-referrer"))
        .add(("Cross-Origin-Resource-Policy", "same-origin"))
}

/// Credentialed CORS for the configured origins. Malformed entries and the
/// `*` wildcard are skipped, since browsers refuse wildcards with credentials.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE"])
        .allowed_headers(vec![
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-csrf-token"),
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in allowed_origins {
        if origin == "*" || origin.parse::<Uri>().is_err() {
            log::warn!("Ignoring invalid CORS origin: {}", origin);
            continue;
        }
        cors = cors.allowed_origin(origin);
    }
    cors
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, middleware::from_fn, test, App, HttpResponse};

    #[::core::prelude::v1::test]
    fn test_limiter_blocks_after_budget() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.1"));
        assert!(!limiter.check("10.0.0.1"));
        assert!(limiter.check("10.0.0.2"), "clients are counted separately");
    }

    #[::core::prelude::v1::test]
    fn test_limiter_window_expires() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup_old_entries();
        assert_eq!(limiter.tracked_clients(), 0);
        assert!(limiter.check("a"));
    }

    #[actix_rt::test]
    async fn test_middleware_returns_429() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RateLimiter::new(1, Duration::from_secs(60))))
                .wrap(from_fn(rate_limit_middleware))
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Too many requests"));
    }

    #[actix_rt::test]
    async fn test_security_headers_and_cors() {
        let origins = vec!["http://localhost:3000".to_string(), "*".to_string()];
        let app = test::init_service(
            App::new()
                .wrap(cors(&origins))
                .wrap(security_headers())
                .route("/", web::get().to(HttpResponse::Ok)),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(
            resp.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
            "nosniff"
        );
        assert_eq!(resp.headers().get(header::X_FRAME_OPTIONS).unwrap(), "DENY");

        let preflight = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/")
            .insert_header((header::ORIGIN, "http://localhost:3000"))
            .insert_header((header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH"))
            .to_request();
        let resp = test::call_service(&app, preflight).await;
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
    }
}
