use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;

use super::config::OidcAuthConfig;
use super::cookies;
use super::state::AuthState;
use crate::flow::{AuthError, CallbackQuery, FlowController};
use crate::session::SessionStore;
use crate::types::SessionId;

/// Create the relying-party authentication router.
pub fn auth_routes<S: SessionStore>(config: OidcAuthConfig, session_store: S) -> Router {
    let auth_path = config.settings.auth_path.clone();

    let controller = FlowController::new(config.client, Arc::new(session_store))
        .with_auth_ttl(config.settings.auth_request_ttl);
    let state = AuthState {
        controller: Arc::new(controller),
        settings: config.settings,
    };

    Router::new()
        .route(&format!("{auth_path}/login"), get(login::<S>))
        .route(&format!("{auth_path}/callback"), get(callback::<S>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<S>).post(logout::<S>),
        )
        .route(
            &format!("{auth_path}/provider-logout-return"),
            get(provider_logout_return::<S>),
        )
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    // Reuse the browser's session when it has one, mint otherwise.
    let session_id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
        .unwrap_or_else(SessionId::generate);

    let url = state
        .controller
        .begin_login(&session_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "login could not be started");
            login_error(&state.settings.error_redirect, "login_failed")
        })?;

    let cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        session_id.as_str(),
        state.settings.session_ttl_days,
        state.settings.secure_cookies,
    );

    Ok((jar.add(cookie), Redirect::to(url.as_str())))
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("unknown error");
        tracing::warn!(error = %error, description = %desc, "provider reported an error on callback");
        return Err(login_error(&state.settings.error_redirect, "provider_error"));
    }

    let code = params
        .code
        .ok_or_else(|| login_error(&state.settings.error_redirect, "missing_code"))?;

    let returned_state = params
        .state
        .ok_or_else(|| login_error(&state.settings.error_redirect, "state_mismatch"))?;

    let session_id = cookies::get_session_id(&jar, &state.settings.session_cookie_name)
        .ok_or_else(|| login_error(&state.settings.error_redirect, "missing_session"))?;

    let query = CallbackQuery {
        code,
        state: returned_state,
    };

    state
        .controller
        .handle_callback(&session_id, &query)
        .await
        .map_err(|e| {
            if e.is_retryable() {
                tracing::error!(error = %e, "callback failed");
            } else {
                tracing::warn!(error = %e, "callback rejected");
            }
            login_error(&state.settings.error_redirect, error_code(&e))
        })?;

    Ok((jar, Redirect::to(&state.settings.login_redirect)))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), Response> {
    let end_session =
        match cookies::get_session_id(&jar, &state.settings.session_cookie_name) {
            Some(session_id) => state.controller.logout(&session_id).await.map_err(|e| {
                tracing::error!(error = %e, "session deletion failed during logout");
                login_error(&state.settings.error_redirect, "logout_failed")
            })?,
            // No local session: still send the browser to the provider so its
            // side of the session is cleared too.
            None => state.controller.client().end_session_url(),
        };

    let clear = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    Ok((jar.remove(clear), Redirect::to(end_session.as_str())))
}

/// Landing point after the provider clears its session.
async fn provider_logout_return<S: SessionStore>(
    State(state): State<AuthState<S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Redirect) {
    let mut jar = jar;
    if let Some(session_id) =
        cookies::get_session_id(&jar, &state.settings.session_cookie_name)
    {
        if let Err(e) = state.controller.logout(&session_id).await {
            tracing::warn!(error = %e, "residual session cleanup failed");
        }
        jar = jar.remove(cookies::clear_session_cookie(
            &state.settings.session_cookie_name,
        ));
    }
    (jar, Redirect::to(&state.settings.logout_redirect))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}

/// Coarse machine-readable code for the error redirect. Never leaks
/// provider responses.
fn error_code(e: &AuthError) -> &'static str {
    match e {
        AuthError::MissingState => "missing_state",
        AuthError::StateMismatch => "state_mismatch",
        AuthError::NonceMismatch => "nonce_mismatch",
        AuthError::Provider(_) => "try_again",
        AuthError::Store(_) | AuthError::Config(_) => "internal",
    }
}
