use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::error::Error;
use crate::provider::{AuthorizationRequest, ProviderClient};
use crate::session::{AuthRequestState, Identity, Session, SessionStore};
use crate::token;
use crate::types::SessionId;

/// Session-store keys owned by the controller.
const AUTH_REQUEST_KEY: &str = "oidc.auth_request";
const IDENTITY_KEY: &str = "oidc.identity";

/// Errors from the relying-party flow.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No pending authorization request: login never started, or the
    /// request expired.
    #[error("no pending authorization request for this session")]
    MissingState,
    /// The callback's `state` does not match the pending request, or the
    /// request was already consumed.
    #[error("state parameter does not match the pending authorization request")]
    StateMismatch,
    /// The ID token's `nonce` does not match the pending request.
    #[error("ID token nonce does not match the pending authorization request")]
    NonceMismatch,
    /// The identity provider could not be reached or rejected a request.
    #[error("identity provider request failed: {0}")]
    Provider(#[from] Error),
    /// Session store operation failed.
    #[error("session store error: {0}")]
    Store(String),
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether the caller may retry the same transition.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::Store(_))
    }
}

/// Callback query parameters the provider redirects back with.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// Orchestrates the relying-party side of the authorization-code flow.
///
/// Three transitions per session: [`begin_login`](Self::begin_login),
/// [`handle_callback`](Self::handle_callback), [`logout`](Self::logout).
/// The controller validates `state` and `nonce`, keeps authorization
/// requests single-use and time-bounded, and reads/writes identity claims
/// through the [`SessionStore`]. It never writes HTTP responses; redirect
/// decisions belong to the caller.
pub struct FlowController<S> {
    client: ProviderClient,
    store: Arc<S>,
    auth_ttl: Duration,
}

impl<S: SessionStore> FlowController<S> {
    #[must_use]
    pub fn new(client: ProviderClient, store: Arc<S>) -> Self {
        Self {
            client,
            store,
            auth_ttl: Duration::minutes(10),
        }
    }

    /// Override how long an authorization request stays valid (default 10
    /// minutes).
    #[must_use]
    pub fn with_auth_ttl(mut self, ttl: Duration) -> Self {
        self.auth_ttl = ttl;
        self
    }

    /// The provider client this controller talks through.
    #[must_use]
    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    /// Start a login: issue state, nonce, and PKCE verifier, store them in
    /// the session, and return the authorization URL to redirect the
    /// browser to.
    ///
    /// Overwrites any prior unconsumed request; with concurrent calls (a
    /// duplicate tab) the last write wins and only its state can validate.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the session store fails.
    pub async fn begin_login(&self, session: &SessionId) -> Result<Url, AuthError> {
        let AuthorizationRequest {
            url,
            state,
            nonce,
            code_verifier,
        } = self.client.authorization_url();

        let record = AuthRequestState {
            state,
            nonce,
            code_verifier,
            created_at: OffsetDateTime::now_utc(),
        };
        self.put(session, AUTH_REQUEST_KEY, &record).await?;

        tracing::debug!(session = %session, "authorization request issued");
        Ok(url)
    }

    /// Complete a login from the provider's callback.
    ///
    /// Validates the `state` against the pending request, consumes the
    /// request (it is single-use from that point), exchanges the code,
    /// checks the ID token's `nonce`, optionally merges userinfo claims,
    /// and writes the resulting [`Identity`] into the session.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingState`] without a pending request or after its
    /// expiry; [`AuthError::StateMismatch`] on a state mismatch or a
    /// replayed callback; [`AuthError::NonceMismatch`] when the ID token
    /// carries the wrong nonce; [`AuthError::Provider`] when the provider
    /// fails or answers malformed (retryable).
    pub async fn handle_callback(
        &self,
        session: &SessionId,
        query: &CallbackQuery,
    ) -> Result<Identity, AuthError> {
        let pending: Option<AuthRequestState> = self.read(session, AUTH_REQUEST_KEY).await?;

        let Some(pending) = pending else {
            // No pending request: either login never started, or a previous
            // callback already consumed it. An authenticated session means
            // the latter, and a cleared state can never match again.
            let authenticated = self.read::<Identity>(session, IDENTITY_KEY).await?.is_some();
            tracing::warn!(
                session = %session,
                authenticated,
                "callback without pending authorization request"
            );
            return Err(if authenticated {
                AuthError::StateMismatch
            } else {
                AuthError::MissingState
            });
        };

        if pending.is_expired(self.auth_ttl) {
            self.discard(session, AUTH_REQUEST_KEY).await?;
            tracing::warn!(session = %session, "authorization request expired");
            return Err(AuthError::MissingState);
        }

        if query.state != pending.state {
            // Leave the pending request in place: a forged callback must not
            // cancel a legitimate login still in flight.
            tracing::warn!(session = %session, "callback state mismatch");
            return Err(AuthError::StateMismatch);
        }

        // Single-use from here on, whatever the exchange yields.
        self.discard(session, AUTH_REQUEST_KEY).await?;

        let tokens = self
            .client
            .exchange_code(&query.code, &pending.code_verifier)
            .await?;
        let id_token = tokens
            .id_token
            .as_deref()
            .ok_or_else(|| Error::Token("token response carried no id_token".into()))?;
        let id_claims = token::decode_id_token(id_token)?;

        if id_claims.nonce() != Some(pending.nonce.as_str()) {
            tracing::warn!(session = %session, "ID token nonce mismatch");
            return Err(AuthError::NonceMismatch);
        }

        let mut claims: BTreeMap<String, Value> = id_claims.into_claims().into_iter().collect();

        if self.client.config().userinfo_url().is_some() {
            let info = self.client.get_user_info(&tokens.access_token).await?;
            // Userinfo must describe the same subject as the ID token.
            if let (Some(Value::String(id_sub)), Some(Value::String(info_sub))) =
                (claims.get("sub"), info.get("sub"))
            {
                if id_sub != info_sub {
                    return Err(Error::Token(
                        "userinfo subject does not match ID token".into(),
                    )
                    .into());
                }
            }
            claims.extend(info);
        }

        let identity = Identity::from_claims(claims)
            .ok_or_else(|| Error::Token("ID token carried no subject claim".into()))?;
        self.put(session, IDENTITY_KEY, &identity).await?;

        tracing::info!(session = %session, sub = %identity.sub, "login completed");
        Ok(identity)
    }

    /// End the local session and return the provider's end-session URL to
    /// redirect the browser to.
    ///
    /// Idempotent: clearing an anonymous session is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the session store fails.
    pub async fn logout(&self, session: &SessionId) -> Result<Url, AuthError> {
        self.store
            .destroy(session)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        tracing::info!(session = %session, "session cleared");
        Ok(self.client.end_session_url())
    }

    /// The session's identity, if authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the session store fails.
    pub async fn identity(&self, session: &SessionId) -> Result<Option<Identity>, AuthError> {
        self.read(session, IDENTITY_KEY).await
    }

    /// Typed snapshot of the session, for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the session store fails.
    pub async fn session(&self, session: &SessionId) -> Result<Session, AuthError> {
        let auth_request = self.read(session, AUTH_REQUEST_KEY).await?;
        let identity = self.read(session, IDENTITY_KEY).await?;
        Ok(Session {
            id: session.clone(),
            auth_request,
            identity,
        })
    }

    async fn put<T: Serialize>(
        &self,
        session: &SessionId,
        key: &str,
        value: &T,
    ) -> Result<(), AuthError> {
        let json = serde_json::to_string(value).map_err(|e| AuthError::Store(e.to_string()))?;
        self.store
            .set(session, key, json)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }

    async fn read<T: DeserializeOwned>(
        &self,
        session: &SessionId,
        key: &str,
    ) -> Result<Option<T>, AuthError> {
        match self
            .store
            .get(session, key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?
        {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AuthError::Store(e.to_string())),
            None => Ok(None),
        }
    }

    async fn discard(&self, session: &SessionId, key: &str) -> Result<(), AuthError> {
        self.store
            .remove(session, key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_and_store_failures_are_retryable() {
        assert!(AuthError::Provider(Error::Token("x".into())).is_retryable());
        assert!(AuthError::Store("down".into()).is_retryable());

        assert!(!AuthError::MissingState.is_retryable());
        assert!(!AuthError::StateMismatch.is_retryable());
        assert!(!AuthError::NonceMismatch.is_retryable());
        assert!(!AuthError::Config("missing".into()).is_retryable());
    }

    #[test]
    fn callback_query_deserializes_from_urlencoded_pairs() {
        let query: CallbackQuery =
            serde_json::from_str(r#"{"code":"XYZ","state":"abc123"}"#).unwrap();
        assert_eq!(query.code, "XYZ");
        assert_eq!(query.state, "abc123");
    }
}
