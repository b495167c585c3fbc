use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::flow::AuthError;

/// Rejection for the [`AuthIdentity`](super::AuthIdentity) extractor.
#[derive(Debug, thiserror::Error)]
pub enum AuthRejection {
    /// No valid session, or the session carries no identity.
    #[error("not authenticated")]
    Unauthenticated,

    /// Session store or controller failure; detail is logged, not served.
    #[error("internal error")]
    Internal,
}

impl From<AuthError> for AuthRejection {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingState | AuthError::StateMismatch | AuthError::NonceMismatch => {
                Self::Unauthenticated
            }
            AuthError::Provider(_) | AuthError::Store(_) | AuthError::Config(_) => {
                tracing::error!(error = %e, "identity lookup failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Not authenticated").into_response()
            }
            Self::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}
