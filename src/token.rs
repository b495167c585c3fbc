use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::Error;

/// Claims decoded from an ID token payload.
///
/// Decode-only: the token is received directly from the token endpoint over
/// the client's own TLS connection, so this module reads the payload without
/// verifying the signature. Do not feed it tokens from any other source.
#[derive(Debug, Clone)]
pub struct IdTokenClaims {
    claims: Map<String, Value>,
}

impl IdTokenClaims {
    /// Look up a claim by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Look up a string claim by name.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// The `sub` claim, if present.
    #[must_use]
    pub fn sub(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// The `nonce` claim, if present.
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.get_str("nonce")
    }

    /// Consume self, yielding the full claim map.
    #[must_use]
    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }
}

/// Decodes the payload segment of a compact JWT.
///
/// # Errors
///
/// Returns [`Error::Token`] if the token is not three dot-separated
/// segments, the payload is not valid base64url, or it is not a JSON object.
pub fn decode_id_token(id_token: &str) -> Result<IdTokenClaims, Error> {
    let mut parts = id_token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::Token("not a compact JWT".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::Token(format!("payload is not base64url: {e}")))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Token(format!("payload is not JSON: {e}")))?;

    match value {
        Value::Object(claims) => Ok(IdTokenClaims { claims }),
        _ => Err(Error::Token("payload is not a JSON object".into())),
    }
}
