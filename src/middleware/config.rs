use std::time::Duration as StdDuration;

use cookie::Key;
use url::Url;

use super::cookies::{
    DEFAULT_SESSION_TTL, DISPLAY_COOKIE_NAME, LEGACY_SESSION_COOKIE_NAME, SESSION_COOKIE_NAME,
    SessionCookies,
};
use super::error::AuthError;
use crate::codec::{MIN_SECRET_LEN, SessionCodec};
use crate::oauth::{AuthClient, OAuthConfig};
use crate::replay::{DEFAULT_SWEEP_INTERVAL, REPLAY_WINDOW};

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) session_key: Key,
    pub(crate) accept_legacy_sessions: bool,
    pub(crate) session_cookie_name: String,
    pub(crate) legacy_session_cookie_name: Option<String>,
    pub(crate) display_cookie_name: String,
    pub(crate) session_ttl: time::Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) cookie_domain: Option<String>,
    pub(crate) auth_path: String,
    pub(crate) error_redirect: String,
    pub(crate) onboarding_redirect: String,
    pub(crate) dashboard_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) replay_window: StdDuration,
    pub(crate) replay_sweep_interval: Option<StdDuration>,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            session_key: Key::generate(),
            accept_legacy_sessions: true,
            session_cookie_name: SESSION_COOKIE_NAME.into(),
            legacy_session_cookie_name: Some(LEGACY_SESSION_COOKIE_NAME.into()),
            display_cookie_name: DISPLAY_COOKIE_NAME.into(),
            session_ttl: DEFAULT_SESSION_TTL,
            secure_cookies: true,
            cookie_domain: None,
            auth_path: "/api/auth".into(),
            error_redirect: "/auth/error".into(),
            onboarding_redirect: "/onboarding".into(),
            dashboard_redirect: "/dashboard".into(),
            logout_redirect: "/".into(),
            replay_window: REPLAY_WINDOW,
            replay_sweep_interval: Some(DEFAULT_SWEEP_INTERVAL),
        }
    }

    pub(crate) fn session_cookies(&self) -> SessionCookies {
        let codec = SessionCodec::new(self.session_key.clone())
            .with_legacy_fallback(self.accept_legacy_sessions);
        SessionCookies::new(codec)
            .with_name(self.session_cookie_name.clone())
            .with_legacy_name(self.legacy_session_cookie_name.clone())
            .with_display_name(self.display_cookie_name.clone())
            .with_domain(self.cookie_domain.clone())
            .with_secure(self.secure_cookies)
            .with_max_age(self.session_ttl)
    }

    pub(crate) fn callback_path(&self) -> String {
        format!("{}/callback", self.auth_path)
    }
}

/// Session-layer configuration.
///
/// Required field (`client`) is a constructor parameter; there is no runtime "missing field" error.
///
/// Use [`from_env()`](SessionAuthConfig::from_env) for convention-based setup,
/// or [`new()`](SessionAuthConfig::new) with `with_*` methods for full control.
pub struct SessionAuthConfig {
    pub(super) client: AuthClient,
    pub(super) settings: AuthSettings,
}

impl SessionAuthConfig {
    /// Create config with the required `AuthClient`.
    ///
    /// All optional fields use sensible defaults. Override with `with_*` methods.
    /// The default session key is ephemeral: sessions do not survive a restart.
    #[must_use]
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `AUTH_DOMAIN`: identity-provider domain (authorize URL is `https://{AUTH_DOMAIN}/authorize`)
    /// - `AUTH_CLIENT_ID`: OAuth2 client ID
    /// - `AUTH_REDIRECT_URI`: URL of the exchange route registered with the provider
    /// - `BACKEND_URL`: backend base URL; codes are exchanged at `{BACKEND_URL}/api/auth/exchange`
    ///
    /// # Optional env vars
    /// - `AUTH_AUDIENCE`: API audience
    /// - `AUTH_SCOPES`: comma-separated OAuth2 scopes
    /// - `BACKEND_TIMEOUT_SECS`: exchange timeout (default 10)
    /// - `SESSION_SECRET`: session encryption secret, at least 32 bytes
    /// - `COOKIE_SECURE`: `0`/`false` to drop the `Secure` attribute (plain-HTTP local dev)
    /// - `APP_ENV` + `COOKIE_DOMAIN`: the shared cookie domain applies only when `APP_ENV=production`
    /// - `SESSION_ACCEPT_LEGACY`: `0`/`false` to reject pre-encryption session cookies
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or values are invalid.
    pub fn from_env() -> Result<Self, AuthError> {
        let domain = required("AUTH_DOMAIN")?;
        let authorize_url = parse_url("AUTH_DOMAIN", &authorize_url_for(&domain))?;
        let client_id = required("AUTH_CLIENT_ID")?;
        let redirect_uri = parse_url("AUTH_REDIRECT_URI", &required("AUTH_REDIRECT_URI")?)?;
        let backend_url = required("BACKEND_URL")?;
        let exchange_url = parse_url(
            "BACKEND_URL",
            &format!("{}/api/auth/exchange", backend_url.trim_end_matches('/')),
        )?;

        let mut oauth = OAuthConfig::new(authorize_url, client_id, redirect_uri, exchange_url);
        if let Ok(audience) = std::env::var("AUTH_AUDIENCE") {
            oauth = oauth.with_audience(audience);
        }
        if let Ok(scopes) = std::env::var("AUTH_SCOPES") {
            oauth = oauth.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }
        if let Ok(secs) = std::env::var("BACKEND_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| AuthError::Config(format!("BACKEND_TIMEOUT_SECS: {e}")))?;
            oauth = oauth.with_exchange_timeout(StdDuration::from_secs(secs));
        }

        let mut config = Self::new(AuthClient::new(oauth));

        match std::env::var("SESSION_SECRET") {
            Ok(secret) => {
                config = config.with_session_secret(secret.as_bytes())?;
            }
            Err(_) => {
                tracing::warn!("SESSION_SECRET not set, using an ephemeral session key");
            }
        }

        if let Some(secure) = env_flag("COOKIE_SECURE")? {
            config = config.with_secure_cookies(secure);
        }
        if let Some(accept) = env_flag("SESSION_ACCEPT_LEGACY")? {
            config = config.with_legacy_sessions(accept);
        }

        let production = std::env::var("APP_ENV").is_ok_and(|env| env == "production");
        if production {
            config = config.with_cookie_domain(std::env::var("COOKIE_DOMAIN").ok());
        }

        Ok(config)
    }

    /// [`SessionCookies`] matching this configuration, for use in the
    /// application's own router state (see [`AuthSession`](super::AuthSession)).
    #[must_use]
    pub fn session_cookies(&self) -> SessionCookies {
        self.settings.session_cookies()
    }

    #[must_use]
    pub fn with_session_key(mut self, key: Key) -> Self {
        self.settings.session_key = key;
        self
    }

    /// Derive the session key from a server-held secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the secret is shorter than 32 bytes.
    pub fn with_session_secret(self, secret: &[u8]) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        Ok(self.with_session_key(Key::derive_from(secret)))
    }

    #[must_use]
    pub fn with_legacy_sessions(mut self, accept: bool) -> Self {
        self.settings.accept_legacy_sessions = accept;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_legacy_session_cookie_name(mut self, name: Option<String>) -> Self {
        self.settings.legacy_session_cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_display_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.display_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: time::Duration) -> Self {
        self.settings.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_cookie_domain(mut self, domain: Option<String>) -> Self {
        self.settings.cookie_domain = domain;
        self
    }

    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_onboarding_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.onboarding_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_dashboard_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.dashboard_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_replay_window(mut self, window: StdDuration) -> Self {
        self.settings.replay_window = window;
        self
    }

    /// Period of the used-code purge; `None` disables the background task.
    #[must_use]
    pub fn with_replay_sweep_interval(mut self, every: Option<StdDuration>) -> Self {
        self.settings.replay_sweep_interval = every;
        self
    }
}

fn authorize_url_for(domain: &str) -> String {
    let domain = domain.trim_end_matches('/');
    if domain.starts_with("http://") || domain.starts_with("https://") {
        format!("{domain}/authorize")
    } else {
        format!("https://{domain}/authorize")
    }
}

fn required(name: &str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is required")))
}

fn parse_url(name: &str, value: &str) -> Result<Url, AuthError> {
    value
        .parse()
        .map_err(|e| AuthError::Config(format!("{name}: {e}")))
}

fn env_flag(name: &str) -> Result<Option<bool>, AuthError> {
    match std::env::var(name).as_deref() {
        Err(_) => Ok(None),
        Ok("1" | "true" | "yes") => Ok(Some(true)),
        Ok("0" | "false" | "no") => Ok(Some(false)),
        Ok(other) => Err(AuthError::Config(format!("{name}: expected a boolean, got {other:?}"))),
    }
}
