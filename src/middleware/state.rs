use std::sync::Arc;

use axum::extract::FromRef;

use super::config::AuthSettings;
use super::cookies::SessionCookies;
use super::traits::UsedCodeStore;
use crate::oauth::AuthClient;
use crate::replay::ReplayGuard;

/// Shared state for auth route handlers.
pub(super) struct AuthState<S> {
    pub(super) client: Arc<AuthClient>,
    pub(super) replay: Arc<ReplayGuard<S>>,
    pub(super) cookies: SessionCookies,
    pub(super) settings: Arc<AuthSettings>,
}

// Manual Clone: avoid derive adding an `S: Clone` bound.
impl<S> Clone for AuthState<S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            replay: self.replay.clone(),
            cookies: self.cookies.clone(),
            settings: self.settings.clone(),
        }
    }
}

// AuthSession / TenantScope pull the cookie store out of router state.
impl<S: UsedCodeStore> FromRef<AuthState<S>> for SessionCookies {
    fn from_ref(state: &AuthState<S>) -> Self {
        state.cookies.clone()
    }
}
