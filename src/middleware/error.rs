use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Authentication errors for the HTTP layer.
///
/// Exchange-flow errors are turned into error-page redirects by the exchange
/// handler; everything else renders as a JSON `{ success: false, ... }` body.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No session cookie on the request.
    #[error("Not authenticated")]
    Unauthenticated,

    /// A session cookie is present but neither codec path accepts it.
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The session is valid but not yet scoped to a tenant.
    #[error("Session has no tenant")]
    TenantRequired,

    /// Exchange invoked without an authorization code.
    #[error("Missing authorization code")]
    MissingCode,

    /// The identity provider reported an error on the redirect.
    #[error("Identity provider error: {code}")]
    Provider {
        code: String,
        description: Option<String>,
    },

    /// The returned `state` does not match the one issued at login.
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// The authorization code was already redeemed within the replay window.
    #[error("Authorization code already used")]
    Replay,

    /// Backend rejected or could not complete the token exchange.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// Payload serialization failed.
    #[error("Session encoding error: {0}")]
    Encoding(String),

    /// Used-code store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// Stable code placed in the `error` query parameter of error-page redirects.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Unauthenticated => "no_session",
            Self::InvalidSession(_) => "invalid_session",
            Self::TenantRequired => "tenant_required",
            Self::MissingCode => "missing_code",
            Self::Provider { code, .. } => code.as_str(),
            Self::StateMismatch => "state_mismatch",
            Self::Replay => "code_reused",
            Self::Exchange(_) => "exchange_failed",
            Self::Encoding(_) => "session_failed",
            Self::Store(_) => "replay_check_failed",
            Self::Config(_) => "configuration_error",
        }
    }

    /// Diagnostic detail placed in the `details` query parameter, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Exchange(detail) => Some(detail.as_str()),
            Self::Provider { description, .. } => description.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::TenantRequired => StatusCode::FORBIDDEN,
            Self::InvalidSession(_)
            | Self::MissingCode
            | Self::Provider { .. }
            | Self::StateMismatch
            | Self::Replay => StatusCode::BAD_REQUEST,
            Self::Exchange(_) => StatusCode::BAD_GATEWAY,
            Self::Encoding(_) | Self::Store(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Auth internal error");
            "Internal error".to_owned()
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "success": false,
            "error": self.code(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        use crate::error::Error;
        match e {
            Error::InvalidSession(msg) => Self::InvalidSession(msg),
            Error::Encoding(msg) => Self::Encoding(msg),
            Error::Key(msg) => Self::Config(msg),
            Error::Exchange { detail, .. } => Self::Exchange(detail),
            other => Self::Exchange(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_error_page_contract() {
        assert_eq!(AuthError::MissingCode.code(), "missing_code");
        assert_eq!(AuthError::Replay.code(), "code_reused");
        assert_eq!(AuthError::Exchange("x".into()).code(), "exchange_failed");
        let provider = AuthError::Provider {
            code: "access_denied".into(),
            description: Some("User cancelled".into()),
        };
        assert_eq!(provider.code(), "access_denied");
        assert_eq!(provider.details(), Some("User cancelled"));
    }

    #[test]
    fn session_errors_are_client_errors() {
        assert_eq!(AuthError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidSession("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::TenantRequired.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::Encoding("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn exchange_error_keeps_backend_detail() {
        let err = AuthError::from(crate::error::Error::Exchange {
            operation: "token exchange",
            status: Some(400),
            detail: "invalid_grant".into(),
        });
        assert_eq!(err.details(), Some("invalid_grant"));
    }
}
