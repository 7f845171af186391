use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use super::cookies::SessionCookies;
use super::error::AuthError;
use crate::payload::SessionPayload;
use crate::types::TenantId;

/// Header carrying the tenant on backend calls.
pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Decoded session of the current request.
///
/// Works with any router state that exposes [`SessionCookies`] through
/// [`FromRef`]. Rejects with `401` when no session cookie is present and
/// `400` when the cookie cannot be decoded.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(AuthSession(session): AuthSession) -> impl IntoResponse {
///     format!("Hello, {}", session.user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthSession(pub SessionPayload);

impl<St> FromRequestParts<St> for AuthSession
where
    SessionCookies: FromRef<St>,
    St: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let cookies = SessionCookies::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        match cookies.read(&jar) {
            Ok(Some(payload)) => Ok(Self(payload)),
            Ok(None) => Err(AuthError::Unauthenticated),
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable session cookie");
                Err(e.into())
            }
        }
    }
}

/// Tenant the current session is scoped to, for proxying backend calls.
///
/// Rejects with `403` when the session exists but onboarding has not yet
/// assigned a tenant.
///
/// # Example
///
/// ```rust,ignore
/// async fn invoices(scope: TenantScope, State(http): State<reqwest::Client>) -> Response {
///     let res = scope.scope(http.get(format!("{BACKEND}/api/invoices/"))).send().await;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TenantScope {
    pub tenant_id: TenantId,
    pub session_token: Option<String>,
}

impl TenantScope {
    #[must_use]
    pub fn from_session(session: &SessionPayload) -> Option<Self> {
        Some(Self {
            tenant_id: session.tenant_id.clone()?,
            session_token: session.access_token.clone(),
        })
    }

    /// Attach the tenant header and the backend bearer token.
    #[must_use]
    pub fn scope(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(TENANT_HEADER, self.tenant_id.as_str());
        match &self.session_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl<St> FromRequestParts<St> for TenantScope
where
    SessionCookies: FromRef<St>,
    St: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &St) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        Self::from_session(&session).ok_or(AuthError::TenantRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SessionUser;

    #[test]
    fn scope_requires_tenant() {
        let session = SessionPayload::new(SessionUser::new("a@b.com", "auth0|1"));
        assert!(TenantScope::from_session(&session).is_none());
    }

    #[test]
    fn scope_sets_tenant_header_and_bearer() {
        let session = SessionPayload::new(SessionUser::new("a@b.com", "auth0|1"))
            .with_access_token("tok1")
            .with_tenant_id("tenant-9");
        let scope = TenantScope::from_session(&session).unwrap();

        let request = scope
            .scope(reqwest::Client::new().get("https://backend.example.com/api/invoices/"))
            .build()
            .unwrap();
        assert_eq!(request.headers()[TENANT_HEADER], "tenant-9");
        assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], "Bearer tok1");
    }
}
