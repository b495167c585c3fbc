#![doc = include_str!("../README.md")]

pub mod error;
pub mod flow;
#[cfg(feature = "axum")]
pub mod middleware;
pub mod provider;
pub mod random;
pub mod session;
pub mod token;
pub mod types;

// Re-exports for convenient access
pub use error::Error;
pub use flow::{AuthError, CallbackQuery, FlowController};
pub use provider::{AuthorizationRequest, ProviderClient, ProviderConfig, TokenResponse};
pub use random::{code_challenge_s256, generate_code_verifier, generate_nonce, generate_state};
pub use session::{
    AuthRequestState, Identity, MemoryStore, Session, SessionState, SessionStore, StoreError,
};
pub use token::{decode_id_token, IdTokenClaims};
pub use types::SessionId;
