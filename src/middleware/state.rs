use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::AuthSettings;
use crate::flow::FlowController;
use crate::session::SessionStore;

/// Shared state for the auth route handlers.
pub struct AuthState<S> {
    pub(super) controller: Arc<FlowController<S>>,
    pub(super) settings: AuthSettings,
}

impl<S: SessionStore> AuthState<S> {
    /// The flow controller behind the routes.
    #[must_use]
    pub fn controller(&self) -> &Arc<FlowController<S>> {
        &self.controller
    }
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AuthState<S> {
    fn clone(&self) -> Self {
        Self {
            controller: self.controller.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<S: SessionStore> FromRef<AuthState<S>> for Key {
    fn from_ref(state: &AuthState<S>) -> Self {
        state.settings.cookie_key.clone()
    }
}
