use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::payload::{SessionPayload, SessionUser};
use crate::pkce::{self, PkceChallenge};
use crate::types::{OnboardingStep, TenantId};

/// Default bound on the backend token-exchange call.
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity-provider and backend endpoints used by the login flow.
///
/// Required fields are constructor parameters; there is no runtime "missing field" error.
///
/// ```rust,ignore
/// use tenant_session::OAuthConfig;
///
/// let config = OAuthConfig::new(
///     "https://tenant.auth0.com/authorize".parse()?,
///     "my-client-id",
///     "https://app.example.com/api/auth/exchange".parse()?,
///     "https://backend.example.com/api/auth/exchange".parse()?,
/// )
/// .with_audience("https://api.example.com");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) authorize_url: Url,
    pub(crate) client_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) exchange_url: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) audience: Option<String>,
    pub(crate) exchange_timeout: Duration,
}

impl OAuthConfig {
    #[must_use]
    pub fn new(
        authorize_url: Url,
        client_id: impl Into<String>,
        redirect_uri: Url,
        exchange_url: Url,
    ) -> Self {
        Self {
            authorize_url,
            client_id: client_id.into(),
            redirect_uri,
            exchange_url,
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            audience: None,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    /// Override the OAuth2 scopes (default: `["openid", "profile", "email"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// API audience requested from the provider.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Bound on the backend exchange call. A timeout counts as a failed exchange.
    #[must_use]
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    #[must_use]
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    #[must_use]
    pub fn exchange_url(&self) -> &Url {
        &self.exchange_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// Provider redirect plus the values to park in transient cookies.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
}

/// Body posted to the backend exchange endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRequest<'a> {
    pub code: &'a str,
    pub redirect_uri: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<&'a str>,
}

/// Successful backend exchange: `{ user, session_token, needs_onboarding }`.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ExchangeResponse {
    pub user: SessionUser,
    pub session_token: String,
    #[serde(default = "default_needs_onboarding")]
    pub needs_onboarding: bool,
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
    #[serde(default)]
    pub current_step: Option<OnboardingStep>,
    #[serde(default)]
    pub id_token: Option<String>,
}

fn default_needs_onboarding() -> bool {
    true
}

impl ExchangeResponse {
    /// Session payload established by a successful exchange.
    #[must_use]
    pub fn into_session(self) -> SessionPayload {
        let mut payload = SessionPayload::new(self.user).with_access_token(self.session_token);
        payload.id_token = self.id_token;
        payload.tenant_id = self.tenant_id;
        if self.needs_onboarding {
            if let Some(step) = self.current_step.filter(|s| !s.is_completed()) {
                payload.current_step = step;
            }
        } else {
            payload.mark_onboarding_completed();
        }
        payload
    }
}

/// Builds provider redirects and redeems authorization codes through the backend.
pub struct AuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl AuthClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Generate an authorization URL with PKCE, state and nonce.
    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = pkce::generate_state();
        let nonce = pkce::generate_nonce();
        let pkce = PkceChallenge::generate();
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("redirect_uri", self.config.redirect_uri.as_str())
                .append_pair("scope", &scope)
                .append_pair("state", &state)
                .append_pair("nonce", &nonce)
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", "S256");
            if let Some(audience) = &self.config.audience {
                query.append_pair("audience", audience);
            }
        }

        AuthorizationRequest {
            url: url.into(),
            state,
            nonce,
            code_verifier: pkce.verifier,
        }
    }

    /// Redeem an authorization code at the backend for a session token.
    ///
    /// Exactly one request, no retry: the code is single-use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure, timeout or a malformed
    /// body, or [`Error::Exchange`] if the backend answers with a non-2xx status.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
        state: Option<&str>,
    ) -> Result<ExchangeResponse, Error> {
        let body = ExchangeRequest {
            code,
            redirect_uri: self.config.redirect_uri.as_str(),
            code_verifier,
            state,
        };

        let response = self
            .http
            .post(self.config.exchange_url.clone())
            .timeout(self.config.exchange_timeout)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        response.json::<ExchangeResponse>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Exchange {
            operation,
            status: Some(status),
            detail: backend_detail(&body),
        })
    }
}

/// Pull a short human-readable reason out of a backend error body.
///
/// Django REST responses carry `{"error": ...}` or `{"detail": ...}`.
fn backend_detail(body: &str) -> String {
    const MAX_DETAIL: usize = 200;

    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "detail", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|d| d.as_str()).map(str::to_owned))
        })
        .unwrap_or_else(|| body.trim().to_owned());
    detail.chars().take(MAX_DETAIL).collect()
}
