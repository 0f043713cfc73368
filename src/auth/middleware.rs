use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    web, Error, HttpMessage, ResponseError,
};
use futures::future::{ready, LocalBoxFuture, Ready};

use super::cookie::SESSION_COOKIE;
use super::service::AuthService;
use super::token::Claims;
use crate::error::AppError;

/// Header a cookie-authenticated client must use to echo its CSRF token.
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Requires a valid session on every request it wraps.
///
/// The JWT is read from the `jwt` cookie, falling back to an
/// `Authorization: Bearer` header. Cookie sessions must also pass the
/// double-submit check on state-changing methods. On success the decoded
/// [`Claims`] are stored in the request extensions.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match authenticate(&req) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(app_err) => {
                log::debug!("rejected {} {}: {}", req.method(), req.path(), app_err);
                let response = req
                    .into_response(app_err.error_response())
                    .map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Cookie,
    Bearer,
}

fn authenticate(req: &ServiceRequest) -> Result<Claims, AppError> {
    let auth = req
        .app_data::<web::Data<AuthService>>()
        .ok_or_else(|| AppError::InternalServerError("Authentication is not configured".into()))?;

    let (token, source) = match req.cookie(SESSION_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => {
            (cookie.value().to_string(), TokenSource::Cookie)
        }
        _ => {
            let bearer = req
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or_else(|| AppError::Unauthorized("Missing token".into()))?;
            (bearer.trim().to_string(), TokenSource::Bearer)
        }
    };

    let claims = auth.verify(&token)?;

    if source == TokenSource::Cookie && requires_csrf(req.method()) {
        let echoed = req
            .headers()
            .get(CSRF_HEADER)
            .and_then(|value| value.to_str().ok());
        if echoed != Some(claims.csrf_token.as_str()) {
            return Err(AppError::Unauthorized(
                "Missing or invalid CSRF token".into(),
            ));
        }
    }

    Ok(claims)
}

fn requires_csrf(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE | Method::CONNECT
    )
}
