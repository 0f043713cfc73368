use std::time::Duration;

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Represents the claims encoded within a session JWT.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject of the token, the user's id.
    pub sub: i64,
    /// Display name of the user at the time of logon.
    pub name: String,
    /// Per-session secret the client must echo in `X-CSRF-TOKEN`.
    pub csrf_token: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: usize,
    /// Expiration timestamp (seconds since epoch).
    pub exp: usize,
}

/// HMAC keys derived from `JWT_SECRET`.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs a token for `user_id` that expires after `ttl`.
///
/// # Returns
/// The encoded JWT, or `AppError::InternalServerError` if encoding fails.
pub fn generate_token(
    keys: &TokenKeys,
    user_id: i64,
    name: &str,
    csrf_token: &str,
    ttl: Duration,
) -> Result<String, AppError> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        csrf_token: csrf_token.to_string(),
        iat: now,
        exp: now.saturating_add(usize::try_from(ttl.as_secs()).unwrap_or(usize::MAX)),
    };

    encode(&Header::default(), &claims, &keys.encoding)
        .map_err(|e| AppError::InternalServerError(format!("Failed to generate token: {}", e)))
}

/// Verifies a JWT's signature and expiry and decodes its claims.
///
/// Returns `AppError::Unauthorized` if the token is malformed, its signature
/// is invalid, or it has expired.
pub fn verify_token(keys: &TokenKeys, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(token, &keys.decoding, &Validation::default())
        .map(|data| data.claims)
        .map_err(AppError::from)
}
