use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

lazy_static! {
    // Letters, digits, spaces and a few name punctuation marks.
    static ref NAME_REGEX: Regex = Regex::new(r"^[\p{L}\p{N} .'_-]+$").unwrap();
}

/// Fields a client may request through the `fields` query parameter.
pub const USER_FIELDS: &[&str] = &["id", "name", "email", "created_at"];

/// A user as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A stored user row, including the bcrypt hash used during logon.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserCredentials> for User {
    fn from(credentials: UserCredentials) -> Self {
        Self {
            id: credentials.id,
            name: credentials.name,
            email: credentials.email,
            created_at: credentials.created_at,
        }
    }
}

/// Data the store needs to create an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// A user together with a summary of their tasks, used by the admin-style listing.
#[derive(Debug, Clone, Serialize, FromRow, PartialEq)]
pub struct UserWithStats {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub task_count: i64,
    /// Up to five ids of tasks that are still open.
    pub pending_task_ids: Vec<i64>,
}

/// Payload for `POST /api/users/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name, 3 to 30 characters after trimming.
    #[validate(
        length(min = 3, max = 30, message = "Name must be between 3 and 30 characters"),
        regex(
            path = "NAME_REGEX",
            message = "Name may only contain letters, digits, spaces and . ' _ -"
        )
    )]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    /// At least eight characters mixing lower and upper case, digits and symbols.
    #[validate(custom = "validate_password_strength")]
    pub password: String,
}

impl RegisterRequest {
    /// Trims the name and lowercases the email. Call before `validate`.
    pub fn normalize(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// Payload for `POST /api/users/logon`.
#[derive(Debug, Deserialize, Validate)]
pub struct LogonRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

impl LogonRequest {
    pub fn normalize(mut self) -> Self {
        self.email = self.email.trim().to_lowercase();
        self
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let long_enough = password.chars().count() >= 8;
    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_symbol = password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace());

    if long_enough && has_lower && has_upper && has_digit && has_symbol {
        Ok(())
    } else {
        let mut error = ValidationError::new("weak_password");
        error.message = Some(
            "Password must be at least 8 characters and mix upper and lower case letters, digits and symbols"
                .into(),
        );
        Err(error)
    }
}
