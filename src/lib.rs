//! Encrypted, tenant-scoped session cookies for Axum applications.
//!
//! - [`SessionCodec`]: AES-GCM session sealing with a legacy base64 fallback.
//! - [`middleware::SessionCookies`]: cookie read/write/clear with a display companion.
//! - [`middleware::auth_routes`]: OAuth code exchange with replay protection and
//!   the session update endpoint used by onboarding.

pub mod codec;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod payload;
pub mod pkce;
pub mod replay;
pub mod types;
pub mod update;
pub mod wire;

// Re-exports for convenient access
pub use codec::{EncodedSession, SessionCodec};
pub use error::Error;
pub use oauth::{AuthClient, AuthorizationRequest, ExchangeResponse, OAuthConfig};
pub use payload::{SessionPayload, SessionUser};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_nonce, generate_state};
pub use replay::{InMemoryCodeStore, ReplayGuard};
pub use types::{OnboardingStep, TenantId, UserSub};
pub use update::SessionUpdate;
