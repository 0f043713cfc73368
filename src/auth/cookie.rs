use std::time::Duration;

use actix_web::cookie::{time, Cookie, SameSite};

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "jwt";

/// How the session cookie is scoped. Production deployments serve the API
/// cross-site over HTTPS, so the cookie is `Secure` with `SameSite=None` there.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    pub secure: bool,
}

impl CookiePolicy {
    pub fn session_cookie(&self, token: String, ttl: Duration) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site())
            .max_age(time::Duration::seconds(
                i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            ))
            .finish()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site())
            .finish();
        cookie.make_removal();
        cookie
    }

    fn same_site(&self) -> SameSite {
        if self.secure {
            SameSite::None
        } else {
            SameSite::Lax
        }
    }
}
