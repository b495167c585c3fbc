use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::PrivateCookieJar;
use time::Duration;

use crate::types::SessionId;

/// Create the session-id cookie. Only the opaque id travels in the cookie;
/// state, nonce, and identity live in the session store.
pub(super) fn session_cookie(
    name: &str,
    session_id: &str,
    ttl_days: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::days(ttl_days))
        .build()
}

/// Create removal cookie for the session id.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Get the session id from cookies.
pub(super) fn get_session_id(jar: &PrivateCookieJar, name: &str) -> Option<SessionId> {
    jar.get(name)
        .map(|c| SessionId::from(c.value().to_string()))
}
