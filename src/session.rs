use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::types::SessionId;

/// Boxed error type for consumer-provided store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Ephemeral record held in the session while a login is in flight.
///
/// Single-use: the callback that consumes it deletes it, and a record older
/// than the controller's validity window is treated as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthRequestState {
    /// Anti-CSRF token echoed back by the provider in the callback query.
    pub state: String,
    /// Anti-replay token the provider must embed in the ID token.
    pub nonce: String,
    /// PKCE code verifier for the token exchange.
    pub code_verifier: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AuthRequestState {
    #[must_use]
    pub fn is_expired(&self, ttl: time::Duration) -> bool {
        OffsetDateTime::now_utc() - self.created_at >= ttl
    }
}

/// Claims of an authenticated subject.
///
/// Immutable once written: the only writer is a callback transition that
/// validated both `state` and `nonce`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Subject identifier (`sub` claim).
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    claims: BTreeMap<String, Value>,
}

impl Identity {
    /// Build an identity from a claim map. Returns `None` when the map
    /// carries no string `sub` claim.
    #[must_use]
    pub fn from_claims(claims: BTreeMap<String, Value>) -> Option<Self> {
        let sub = claims.get("sub")?.as_str()?.to_string();
        let email = claims.get("email").and_then(Value::as_str).map(String::from);
        let name = claims.get("name").and_then(Value::as_str).map(String::from);
        Some(Self {
            sub,
            email,
            name,
            claims,
        })
    }

    /// Look up any claim by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The full claim map.
    #[must_use]
    pub fn claims(&self) -> &BTreeMap<String, Value> {
        &self.claims
    }
}

/// Where a session sits in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    PendingAuth,
    Authenticated,
}

/// Typed snapshot of one browser session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(default)]
    pub auth_request: Option<AuthRequestState>,
    #[serde(default)]
    pub identity: Option<Identity>,
}

impl Session {
    /// A fresh anonymous session.
    #[must_use]
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            auth_request: None,
            identity: None,
        }
    }

    /// Lifecycle state. A pending authorization request wins over an
    /// existing identity: re-authentication re-enters `PendingAuth`.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.auth_request.is_some() {
            SessionState::PendingAuth
        } else if self.identity.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Consumer-provided session persistence.
///
/// Opaque key→value storage keyed by session identifier. Implementations
/// must keep sessions isolated from each other and tolerate concurrent
/// access from simultaneous requests.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for MyRedisStore {
///     async fn get(&self, id: &SessionId, key: &str) -> Result<Option<String>, StoreError> {
///         self.conn.hget(id.as_str(), key).await.map_err(Into::into)
///     }
///     // set / remove / destroy follow the same shape
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Read one value, `None` when absent.
    fn get(
        &self,
        id: &SessionId,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Write one value, overwriting any previous one.
    fn set(
        &self,
        id: &SessionId,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete one value; deleting an absent key is not an error.
    fn remove(
        &self,
        id: &SessionId,
        key: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete the whole session.
    fn destroy(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory [`SessionStore`] for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    async fn get(&self, id: &SessionId, key: &str) -> Result<Option<String>, StoreError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| StoreError::from("session store lock poisoned"))?;
        Ok(sessions.get(id).and_then(|s| s.get(key)).cloned())
    }

    async fn set(&self, id: &SessionId, key: &str, value: String) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| StoreError::from("session store lock poisoned"))?;
        sessions
            .entry(id.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, id: &SessionId, key: &str) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| StoreError::from("session store lock poisoned"))?;
        if let Some(session) = sessions.get_mut(id) {
            session.remove(key);
        }
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), StoreError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| StoreError::from("session store lock poisoned"))?;
        sessions.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn identity_requires_sub() {
        assert!(Identity::from_claims(claims(&[("email", json!("a@b.com"))])).is_none());
        assert!(Identity::from_claims(claims(&[("sub", json!(42))])).is_none());

        let identity = Identity::from_claims(claims(&[
            ("sub", json!("u1")),
            ("email", json!("a@b.com")),
            ("name", json!("Test User")),
            ("locale", json!("en")),
        ]))
        .unwrap();
        assert_eq!(identity.sub, "u1");
        assert_eq!(identity.email.as_deref(), Some("a@b.com"));
        assert_eq!(identity.name.as_deref(), Some("Test User"));
        assert_eq!(identity.claim("locale"), Some(&json!("en")));
        assert_eq!(identity.claim("missing"), None);
    }

    #[test]
    fn session_state_machine_snapshots() {
        let mut session = Session::new(SessionId::generate());
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(!session.is_authenticated());

        session.auth_request = Some(AuthRequestState {
            state: "s".into(),
            nonce: "n".into(),
            code_verifier: "v".into(),
            created_at: OffsetDateTime::now_utc(),
        });
        assert_eq!(session.state(), SessionState::PendingAuth);

        session.auth_request = None;
        session.identity = Identity::from_claims(claims(&[("sub", json!("u1"))]));
        assert_eq!(session.state(), SessionState::Authenticated);
        assert!(session.is_authenticated());

        // Re-authentication: a new pending request wins over the identity.
        session.auth_request = Some(AuthRequestState {
            state: "s2".into(),
            nonce: "n2".into(),
            code_verifier: "v2".into(),
            created_at: OffsetDateTime::now_utc(),
        });
        assert_eq!(session.state(), SessionState::PendingAuth);
    }

    #[test]
    fn auth_request_expiry() {
        let record = AuthRequestState {
            state: "s".into(),
            nonce: "n".into(),
            code_verifier: "v".into(),
            created_at: OffsetDateTime::now_utc() - time::Duration::minutes(11),
        };
        assert!(record.is_expired(time::Duration::minutes(10)));
        assert!(!record.is_expired(time::Duration::minutes(15)));
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let id = SessionId::generate();

        assert_eq!(store.get(&id, "k").await.unwrap(), None);
        store.set(&id, "k", "v1".into()).await.unwrap();
        assert_eq!(store.get(&id, "k").await.unwrap().as_deref(), Some("v1"));

        store.set(&id, "k", "v2".into()).await.unwrap();
        assert_eq!(store.get(&id, "k").await.unwrap().as_deref(), Some("v2"));

        store.remove(&id, "k").await.unwrap();
        assert_eq!(store.get(&id, "k").await.unwrap(), None);

        // removing an absent key is fine
        store.remove(&id, "k").await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_isolates_sessions() {
        let store = MemoryStore::new();
        let a = SessionId::generate();
        let b = SessionId::generate();

        store.set(&a, "k", "from-a".into()).await.unwrap();
        store.set(&b, "k", "from-b".into()).await.unwrap();
        assert_eq!(store.get(&a, "k").await.unwrap().as_deref(), Some("from-a"));
        assert_eq!(store.get(&b, "k").await.unwrap().as_deref(), Some("from-b"));

        store.destroy(&a).await.unwrap();
        assert_eq!(store.get(&a, "k").await.unwrap(), None);
        assert_eq!(store.get(&b, "k").await.unwrap().as_deref(), Some("from-b"));
    }
}
