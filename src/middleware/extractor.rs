use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::PrivateCookieJar;

use super::cookies;
use super::error::AuthRejection;
use super::state::AuthState;
use crate::flow::{AuthError, FlowController};
use crate::session::{Identity, SessionStore};
use crate::types::SessionId;

/// Authenticated identity extracted from the session cookie.
///
/// Use as an axum extractor in handlers mounted on the auth router's state.
/// Returns `401 Unauthorized` when no valid session exists. For handlers on
/// your own router state, use [`resolve_identity`] instead.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(auth: AuthIdentity) -> impl IntoResponse {
///     format!("Hello, {}", auth.identity.sub)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    /// Session id from the cookie.
    pub session_id: SessionId,
    /// Claims of the authenticated subject.
    pub identity: Identity,
}

impl<S: SessionStore> FromRequestParts<AuthState<S>> for AuthIdentity {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AuthState<S>,
    ) -> Result<Self, Self::Rejection> {
        let jar = PrivateCookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthRejection::Unauthenticated)?;

        let session_id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
            .ok_or(AuthRejection::Unauthenticated)?;

        let identity = state
            .controller
            .identity(&session_id)
            .await
            .map_err(AuthRejection::from)?
            .ok_or(AuthRejection::Unauthenticated)?;

        Ok(Self {
            session_id,
            identity,
        })
    }
}

/// Look up the caller's identity from a cookie jar.
///
/// For consumer middleware and handlers that run outside the auth router's
/// state: build the `PrivateCookieJar` with the same cookie key the auth
/// routes use, then pass it here.
///
/// # Errors
///
/// Returns [`AuthError::Store`] when the session store fails.
pub async fn resolve_identity<S: SessionStore>(
    controller: &FlowController<S>,
    jar: &PrivateCookieJar,
    cookie_name: &str,
) -> Result<Option<AuthIdentity>, AuthError> {
    let Some(session_id) = cookies::get_session_id(jar, cookie_name) else {
        return Ok(None);
    };
    Ok(controller
        .identity(&session_id)
        .await?
        .map(|identity| AuthIdentity {
            session_id,
            identity,
        }))
}
