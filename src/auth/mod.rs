//! Session authentication: bcrypt passwords, signed JWT sessions delivered in
//! an `HttpOnly` cookie, and a double-submit CSRF check for cookie sessions.

pub mod cookie;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod service;
pub mod token;

pub use cookie::{CookiePolicy, SESSION_COOKIE};
pub use extractors::AuthenticatedUser;
pub use middleware::{AuthMiddleware, CSRF_HEADER};
pub use password::{hash_password, verify_password};
pub use service::{AuthService, Session};
pub use token::{generate_token, verify_token, Claims, TokenKeys};
