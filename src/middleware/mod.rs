//! Plug-and-play OIDC login routes for axum.
//!
//! Mounts the four relying-party entry points and keeps the session id in
//! an encrypted cookie; everything else lives in the session store.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oidc_rp::middleware::{auth_routes, OidcAuthConfig};
//! use oidc_rp::MemoryStore;
//!
//! // 1. Configure from environment (OIDC_ISSUER_URL, OIDC_CLIENT_ID, ...)
//! let config = OidcAuthConfig::from_env()?;
//!
//! // 2. Mount the auth routes
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, MemoryStore::new()));
//!
//! // 3. In your own middleware, use resolve_identity() with the shared
//! //    cookie key to look up the caller's Identity.
//! ```
//!
//! Routes (optionally under a path prefix via `with_auth_path`):
//!
//! - `GET /login` — start the flow, 302 to the provider
//! - `GET /callback` — complete the flow, 302 home (or to the error
//!   location with a coarse `error` code)
//! - `GET|POST /logout` — clear the session, 302 to the provider's
//!   end-session endpoint
//! - `GET /provider-logout-return` — landing point after provider logout,
//!   clears any residual state and 302s home

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;

pub use config::OidcAuthConfig;
pub use error::AuthRejection;
pub use extractor::{resolve_identity, AuthIdentity};
pub use routes::auth_routes;
pub use state::AuthState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
