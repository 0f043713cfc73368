use std::sync::Arc;
use std::time::Duration;

use actix_web::{cookie::Cookie, web};
use tokio::sync::OnceCell;
use uuid::Uuid;

use super::cookie::CookiePolicy;
use super::password;
use super::token::{generate_token, verify_token, Claims, TokenKeys};
use crate::config::Config;
use crate::error::AppError;
use crate::models::User;

/// A freshly issued session: the signed JWT plus the CSRF token embedded in it.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub csrf_token: String,
}

/// Everything handlers need to authenticate users, shared as `web::Data<AuthService>`.
#[derive(Clone)]
pub struct AuthService {
    keys: TokenKeys,
    token_ttl: Duration,
    cookies: CookiePolicy,
    bcrypt_cost: u32,
    /// Hash checked when the email is unknown, so both logon failures cost one bcrypt verify.
    decoy_hash: Arc<OnceCell<String>>,
}

impl AuthService {
    pub fn new(secret: &str, token_ttl: Duration, secure_cookies: bool, bcrypt_cost: u32) -> Self {
        Self {
            keys: TokenKeys::from_secret(secret),
            token_ttl,
            cookies: CookiePolicy {
                secure: secure_cookies,
            },
            bcrypt_cost,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_secret,
            config.token_ttl,
            config.is_production(),
            config.bcrypt_cost,
        )
    }

    /// Hashes on the blocking thread pool; bcrypt is deliberately slow.
    pub async fn hash_password(&self, plain: String) -> Result<String, AppError> {
        let cost = self.bcrypt_cost;
        web::block(move || password::hash_password(&plain, cost))
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
    }

    pub async fn verify_password(&self, plain: String, hash: String) -> Result<bool, AppError> {
        web::block(move || password::verify_password(&plain, &hash))
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
    }

    /// Spends the same work as [`Self::verify_password`] for an unknown account.
    pub async fn verify_unknown(&self, plain: String) -> Result<(), AppError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| self.hash_password(Uuid::new_v4().to_string()))
            .await?
            .clone();
        self.verify_password(plain, hash).await?;
        Ok(())
    }

    /// Signs a new session for `user` with a fresh CSRF token.
    pub fn issue_session(&self, user: &User) -> Result<Session, AppError> {
        let csrf_token = Uuid::new_v4().to_string();
        let token = generate_token(&self.keys, user.id, &user.name, &csrf_token, self.token_ttl)?;
        Ok(Session { token, csrf_token })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        verify_token(&self.keys, token)
    }

    pub fn session_cookie(&self, session: &Session) -> Cookie<'static> {
        self.cookies
            .session_cookie(session.token.clone(), self.token_ttl)
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        self.cookies.removal_cookie()
    }
}
