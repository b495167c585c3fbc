use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::random;

/// Opaque browser-session identifier.
///
/// Generated per browser and used as the key into the
/// [`SessionStore`](crate::session::SessionStore). Unguessable by
/// construction: 32 random bytes, base64url-encoded.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Mint a fresh unguessable identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(random::generate_session_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_from_string() {
        let id = SessionId::from("sess-abc".to_string());
        assert_eq!(id.to_string(), "sess-abc");
        assert_eq!(id.as_str(), "sess-abc");
    }

    #[test]
    fn session_id_serde_transparent() {
        let id = SessionId::from("sess-abc".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sess-abc\"");
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }
}
