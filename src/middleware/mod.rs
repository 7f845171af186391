//! Cookie-backed session layer for Axum.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tenant_session::InMemoryCodeStore;
//! use tenant_session::middleware::{SessionAuthConfig, TenantScope, auth_routes};
//!
//! // 1. Configure from environment (SESSION_SECRET, AUTH_*, BACKEND_URL)
//! let config = SessionAuthConfig::from_env()?;
//!
//! // 2. Mount auth routes with a used-code store
//! let app = axum::Router::new()
//!     .merge(auth_routes(config, InMemoryCodeStore::new()));
//!
//! // 3. Use AuthSession / TenantScope extractors in handlers
//! async fn invoices(scope: TenantScope) { /* scope.scope(request) */ }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;
mod traits;
mod types;

pub use config::SessionAuthConfig;
pub use cookies::{
    DEFAULT_SESSION_TTL, DISPLAY_COOKIE_NAME, LEGACY_SESSION_COOKIE_NAME, SESSION_COOKIE_NAME,
    SessionCookies, WriteOptions,
};
pub use error::AuthError;
pub use extractor::{AuthSession, TENANT_HEADER, TenantScope};
pub use routes::auth_routes;
pub use traits::{StoreError, UsedCodeStore};
pub use types::{SessionStatus, UpdateResult};

/// Re-export cookie key type for builder API.
pub use cookie::Key as CookieKey;
