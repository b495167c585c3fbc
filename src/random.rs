use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generates a cryptographically random `state` parameter.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
/// Binds one authorization request to its callback; single-use.
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates a cryptographically random `nonce` for the ID token.
///
/// Returns a 22-character URL-safe string (16 random bytes → base64url).
#[must_use]
pub fn generate_nonce() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generates a cryptographically random code verifier for PKCE.
///
/// Returns a 64-character URL-safe string (RFC 7636 compliant, 43-128 chars).
#[must_use]
pub fn generate_code_verifier() -> String {
    let random_bytes: [u8; 48] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Computes the S256 code challenge from a code verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
#[must_use]
pub fn code_challenge_s256(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generates an unguessable session identifier.
///
/// Returns a 43-character URL-safe string (32 random bytes → base64url).
#[must_use]
pub fn generate_session_id() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_length() {
        assert_eq!(generate_state().len(), 22);
    }

    #[test]
    fn test_state_uniqueness() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn test_nonce_length_and_uniqueness() {
        assert_eq!(generate_nonce().len(), 22);
        assert_ne!(generate_nonce(), generate_nonce());
    }

    #[test]
    fn test_code_verifier_length() {
        assert_eq!(generate_code_verifier().len(), 64);
    }

    #[test]
    fn test_code_verifier_url_safe() {
        let verifier = generate_code_verifier();
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier should be URL-safe: {}",
            verifier
        );
    }

    #[test]
    fn test_code_challenge_deterministic() {
        let verifier = "test_verifier_string";
        assert_eq!(code_challenge_s256(verifier), code_challenge_s256(verifier));
    }

    #[test]
    fn test_code_challenge_different_for_different_verifiers() {
        assert_ne!(code_challenge_s256("verifier_1"), code_challenge_s256("verifier_2"));
    }

    #[test]
    fn test_session_id_length_and_uniqueness() {
        assert_eq!(generate_session_id().len(), 43);
        assert_ne!(generate_session_id(), generate_session_id());
    }
}
