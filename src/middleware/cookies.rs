use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use time::Duration;

use crate::codec::SessionCodec;
use crate::error::Error;
use crate::oauth::AuthorizationRequest;
use crate::payload::SessionPayload;

pub const SESSION_COOKIE_NAME: &str = "app_session";
/// Name used before the session cookie was renamed. Read, never written.
pub const LEGACY_SESSION_COOKIE_NAME: &str = "appSession";
pub const DISPLAY_COOKIE_NAME: &str = "session_display";
pub const DEFAULT_SESSION_TTL: Duration = Duration::days(7);

const STATE_COOKIE_NAME: &str = "auth_state";
const VERIFIER_COOKIE_NAME: &str = "auth_verifier";
const NONCE_COOKIE_NAME: &str = "auth_nonce";
const TRANSIENT_TTL: Duration = Duration::minutes(10);

/// Per-write overrides for [`SessionCookies::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    max_age: Option<Duration>,
    cross_site: bool,
}

impl WriteOptions {
    /// `SameSite=None`, for responses that must be accepted cross-site.
    #[must_use]
    pub fn cross_site() -> Self {
        Self {
            max_age: None,
            cross_site: true,
        }
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// Reads and writes the session cookies with one consistent set of attributes.
///
/// Every `Set-Cookie` it emits is `HttpOnly` (except the display cookie),
/// `Path=/`, `Secure` per configuration and scoped to the shared domain
/// when one is configured.
#[derive(Clone, Debug)]
pub struct SessionCookies {
    codec: SessionCodec,
    name: String,
    legacy_name: Option<String>,
    display_name: String,
    domain: Option<String>,
    secure: bool,
    max_age: Duration,
}

impl SessionCookies {
    #[must_use]
    pub fn new(codec: SessionCodec) -> Self {
        Self {
            codec,
            name: SESSION_COOKIE_NAME.into(),
            legacy_name: Some(LEGACY_SESSION_COOKIE_NAME.into()),
            display_name: DISPLAY_COOKIE_NAME.into(),
            domain: None,
            secure: true,
            max_age: DEFAULT_SESSION_TTL,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_legacy_name(mut self, name: Option<String>) -> Self {
        self.legacy_name = name;
        self
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Shared parent domain (e.g. `.example.com`); `None` keeps cookies host-only.
    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    #[must_use]
    pub fn codec(&self) -> &SessionCodec {
        &self.codec
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Encrypt `payload` into the session cookie.
    ///
    /// Max-age restarts from now on every write. A legacy-named cookie
    /// carried by the request is expired in the same response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the payload cannot be serialized.
    pub fn write(
        &self,
        jar: CookieJar,
        payload: &SessionPayload,
        options: WriteOptions,
    ) -> Result<CookieJar, Error> {
        let value = self.codec.encode(payload)?;
        let mut jar = jar.add(self.build(self.name.clone(), value, true, options));
        if let Some(legacy) = &self.legacy_name {
            if jar.get(legacy).is_some() {
                jar = jar.add(self.removal(legacy.clone(), true, options));
            }
        }
        Ok(jar)
    }

    /// Companion cookie readable by client scripts: display fields only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the display fields cannot be serialized.
    pub fn write_display(
        &self,
        jar: CookieJar,
        payload: &SessionPayload,
        options: WriteOptions,
    ) -> Result<CookieJar, Error> {
        let display = DisplayFields {
            email: &payload.user.email,
            name: payload.user.name.as_deref(),
            picture: payload.user.picture.as_deref(),
            tenant_id: payload.tenant_id.as_ref().map(|t| t.as_str()),
        };
        let json = serde_json::to_vec(&display).map_err(|e| Error::Encoding(e.to_string()))?;
        let value = URL_SAFE_NO_PAD.encode(json);
        Ok(jar.add(self.build(self.display_name.clone(), value, false, options)))
    }

    /// Decode the session carried by the request.
    ///
    /// `Ok(None)` means "not authenticated"; an undecodable cookie is an error
    /// so callers can tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if a cookie is present but cannot be decoded.
    pub fn read(&self, jar: &CookieJar) -> Result<Option<SessionPayload>, Error> {
        let cookie = jar.get(&self.name).filter(|c| !c.value().is_empty()).or_else(|| {
            self.legacy_name
                .as_deref()
                .and_then(|legacy| jar.get(legacy))
                .filter(|c| !c.value().is_empty())
        });
        let Some(cookie) = cookie else {
            return Ok(None);
        };
        self.codec.decode(cookie.value()).map(Some)
    }

    /// Expire every session cookie name and the display cookie.
    ///
    /// Path, domain, `SameSite` and `Secure` match [`write`](Self::write) for
    /// the same `options`, otherwise browsers ignore the deletion.
    #[must_use]
    pub fn clear(&self, jar: CookieJar, options: WriteOptions) -> CookieJar {
        let mut jar = jar.add(self.removal(self.name.clone(), true, options));
        if let Some(legacy) = &self.legacy_name {
            jar = jar.add(self.removal(legacy.clone(), true, options));
        }
        jar.add(self.removal(self.display_name.clone(), false, options))
    }

    fn same_site(&self, options: WriteOptions) -> SameSite {
        // Browsers drop `SameSite=None` cookies that are not `Secure`.
        if options.cross_site && self.secure {
            SameSite::None
        } else {
            SameSite::Lax
        }
    }

    fn build(
        &self,
        name: String,
        value: String,
        http_only: bool,
        options: WriteOptions,
    ) -> Cookie<'static> {
        let mut builder = Cookie::build((name, value))
            .http_only(http_only)
            .secure(self.secure)
            .same_site(self.same_site(options))
            .path("/")
            .max_age(options.max_age.unwrap_or(self.max_age));
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    fn removal(&self, name: String, http_only: bool, options: WriteOptions) -> Cookie<'static> {
        let mut cookie = self.build(name, String::new(), http_only, options);
        cookie.make_removal();
        cookie
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayFields<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
}

/// Values parked in transient cookies between login and exchange.
#[derive(Debug, Default)]
pub(super) struct TransientValues {
    pub(super) state: Option<String>,
    pub(super) verifier: Option<String>,
    pub(super) nonce: Option<String>,
}

/// Set state, PKCE verifier and nonce cookies for the authorization request.
pub(super) fn add_transient(
    jar: CookieJar,
    request: &AuthorizationRequest,
    secure: bool,
    auth_path: &str,
) -> CookieJar {
    [
        (STATE_COOKIE_NAME, &request.state),
        (VERIFIER_COOKIE_NAME, &request.code_verifier),
        (NONCE_COOKIE_NAME, &request.nonce),
    ]
    .into_iter()
    .fold(jar, |jar, (name, value)| {
        jar.add(transient_cookie(name, value.clone(), secure, auth_path))
    })
}

pub(super) fn read_transient(jar: &CookieJar) -> TransientValues {
    let value = |name: &str| jar.get(name).map(|c| c.value().to_owned()).filter(|v| !v.is_empty());
    TransientValues {
        state: value(STATE_COOKIE_NAME),
        verifier: value(VERIFIER_COOKIE_NAME),
        nonce: value(NONCE_COOKIE_NAME),
    }
}

/// Expire the transient cookies, whatever the outcome of the exchange.
pub(super) fn clear_transient(jar: CookieJar, secure: bool, auth_path: &str) -> CookieJar {
    [STATE_COOKIE_NAME, VERIFIER_COOKIE_NAME, NONCE_COOKIE_NAME]
        .into_iter()
        .fold(jar, |jar, name| {
            let mut cookie = transient_cookie(name, String::new(), secure, auth_path);
            cookie.make_removal();
            jar.add(cookie)
        })
}

fn transient_cookie(name: &'static str, value: String, secure: bool, auth_path: &str) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path(auth_path.to_owned())
        .max_age(TRANSIENT_TTL)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SessionUser;

    fn cookies() -> SessionCookies {
        SessionCookies::new(
            SessionCodec::from_secret(b"0123456789abcdef0123456789abcdef").unwrap(),
        )
    }

    fn payload() -> SessionPayload {
        SessionPayload::new(SessionUser::new("a@b.com", "auth0|1").with_name("Ada"))
            .with_access_token("tok1")
            .with_tenant_id("tenant-9")
    }

    fn jar_with(name: &str, value: String) -> CookieJar {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            format!("{name}={value}").parse().unwrap(),
        );
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn write_sets_expected_attributes() {
        let jar = cookies().write(CookieJar::new(), &payload(), WriteOptions::default()).unwrap();
        let cookie = jar.get(SESSION_COOKIE_NAME).unwrap();

        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
        assert_eq!(cookie.domain(), None);
    }

    #[test]
    fn write_honours_overrides_and_domain() {
        let store = cookies().with_domain(Some("example.com".into()));
        let options = WriteOptions::cross_site().with_max_age(Duration::hours(1));
        let jar = store.write(CookieJar::new(), &payload(), options).unwrap();
        let cookie = jar.get(SESSION_COOKIE_NAME).unwrap();

        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.max_age(), Some(Duration::hours(1)));
        assert_eq!(cookie.domain(), Some("example.com"));
    }

    #[test]
    fn insecure_cookies_never_use_same_site_none() {
        let store = cookies().with_secure(false);
        let jar = store.write(CookieJar::new(), &payload(), WriteOptions::cross_site()).unwrap();
        let cookie = jar.get(SESSION_COOKIE_NAME).unwrap();
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }

    #[test]
    fn read_round_trips_written_cookie() {
        let store = cookies();
        let written = store.write(CookieJar::new(), &payload(), WriteOptions::default()).unwrap();
        let value = written.get(SESSION_COOKIE_NAME).unwrap().value().to_owned();

        let jar = jar_with(SESSION_COOKIE_NAME, value);
        assert_eq!(store.read(&jar).unwrap(), Some(payload()));
    }

    #[test]
    fn read_without_cookie_is_none() {
        assert_eq!(cookies().read(&CookieJar::new()).unwrap(), None);
    }

    #[test]
    fn read_falls_back_to_legacy_name() {
        let store = cookies();
        let value = store.codec().encode(&payload()).unwrap();
        let jar = jar_with(LEGACY_SESSION_COOKIE_NAME, value);
        assert_eq!(store.read(&jar).unwrap(), Some(payload()));
    }

    #[test]
    fn read_garbage_is_invalid_session() {
        let jar = jar_with(SESSION_COOKIE_NAME, "garbage".into());
        assert!(matches!(cookies().read(&jar), Err(Error::InvalidSession(_))));
    }

    #[test]
    fn write_retires_legacy_cookie() {
        let store = cookies();
        let value = store.codec().encode(&payload()).unwrap();
        let jar = jar_with(LEGACY_SESSION_COOKIE_NAME, value);

        let jar = store.write(jar, &payload(), WriteOptions::default()).unwrap();
        let legacy = jar.get(LEGACY_SESSION_COOKIE_NAME).unwrap();
        assert_eq!(legacy.value(), "");
        assert_eq!(legacy.max_age(), Some(Duration::ZERO));
    }

    #[test]
    fn clear_mirrors_write_attributes() {
        let store = cookies().with_domain(Some("example.com".into()));
        for options in [WriteOptions::default(), WriteOptions::cross_site()] {
            let written = store.write(CookieJar::new(), &payload(), options).unwrap();
            let written = written.get(SESSION_COOKIE_NAME).unwrap();

            let cleared = store.clear(CookieJar::new(), options);
            let removal = cleared.get(SESSION_COOKIE_NAME).unwrap();

            assert_eq!(removal.value(), "");
            assert_eq!(removal.max_age(), Some(Duration::ZERO));
            assert_eq!(removal.path(), written.path());
            assert_eq!(removal.domain(), written.domain());
            assert_eq!(removal.same_site(), written.same_site());
            assert_eq!(removal.secure(), written.secure());
        }
    }

    #[test]
    fn clear_covers_legacy_and_display_cookies() {
        let cleared = cookies().clear(CookieJar::new(), WriteOptions::default());
        for name in [SESSION_COOKIE_NAME, LEGACY_SESSION_COOKIE_NAME, DISPLAY_COOKIE_NAME] {
            let cookie = cleared.get(name).unwrap();
            assert_eq!(cookie.max_age(), Some(Duration::ZERO), "{name}");
            assert_eq!(cookie.path(), Some("/"), "{name}");
        }
    }

    #[test]
    fn display_cookie_is_script_readable_and_minimal() {
        let jar = cookies()
            .write_display(CookieJar::new(), &payload(), WriteOptions::default())
            .unwrap();
        let cookie = jar.get(DISPLAY_COOKIE_NAME).unwrap();
        assert_eq!(cookie.http_only(), Some(false));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(cookie.value()).unwrap()).unwrap();
        assert_eq!(json["email"], "a@b.com");
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["tenantId"], "tenant-9");
        assert!(json.get("accessToken").is_none());
    }

    #[test]
    fn transient_cookies_round_trip_and_clear() {
        let request = AuthorizationRequest {
            url: "https://login.example.com/authorize".into(),
            state: "st".into(),
            nonce: "no".into(),
            code_verifier: "ver".into(),
        };
        let jar = add_transient(CookieJar::new(), &request, true, "/api/auth");
        let cookie = jar.get(VERIFIER_COOKIE_NAME).unwrap();
        assert_eq!(cookie.path(), Some("/api/auth"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(TRANSIENT_TTL));

        let values = read_transient(&jar);
        assert_eq!(values.state.as_deref(), Some("st"));
        assert_eq!(values.verifier.as_deref(), Some("ver"));
        assert_eq!(values.nonce.as_deref(), Some("no"));

        let cleared = clear_transient(jar, true, "/api/auth");
        let values = read_transient(&cleared);
        assert!(values.state.is_none() && values.verifier.is_none() && values.nonce.is_none());
    }
}
