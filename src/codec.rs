use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use cookie::{Cookie, CookieJar, Key};

use crate::error::Error;
use crate::payload::SessionPayload;
use crate::wire;

/// Name bound into the ciphertext as associated data.
///
/// Fixed regardless of the cookie name the value travels under, so the
/// canonical and legacy cookie names decrypt identically.
const SEAL_NAME: &str = "session";

/// Minimum secret length accepted by [`SessionCodec::from_secret`].
pub const MIN_SECRET_LEN: usize = 32;

/// A decoded session, tagged with the format it was stored in.
///
/// The format is inferred by trial decryption; cookies carry no version flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedSession {
    /// Authenticated-encrypted payload.
    V1(SessionPayload),
    /// Pre-encryption base64(JSON) payload. Accepted only while
    /// [`SessionCodec::accepts_legacy`] is on; re-encoding upgrades it to `V1`.
    Legacy(SessionPayload),
}

impl EncodedSession {
    #[must_use]
    pub fn into_payload(self) -> SessionPayload {
        match self {
            Self::V1(p) | Self::Legacy(p) => p,
        }
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy(_))
    }
}

/// Turns a [`SessionPayload`] into an opaque cookie-safe string and back.
///
/// Encryption is AES-256-GCM via the `cookie` crate's private jar.
#[derive(Clone)]
pub struct SessionCodec {
    key: Key,
    accept_legacy: bool,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("accept_legacy", &self.accept_legacy)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            accept_legacy: true,
        }
    }

    /// Derive the encryption key from a server-held secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Key`] if the secret is shorter than [`MIN_SECRET_LEN`] bytes.
    pub fn from_secret(secret: &[u8]) -> Result<Self, Error> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::Key(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Self::new(Key::derive_from(secret)))
    }

    /// Toggle the legacy base64(JSON) fallback. Turn it off once the
    /// migration window for pre-encryption cookies has passed.
    #[must_use]
    pub fn with_legacy_fallback(mut self, accept: bool) -> Self {
        self.accept_legacy = accept;
        self
    }

    #[must_use]
    pub fn accepts_legacy(&self) -> bool {
        self.accept_legacy
    }

    /// Serialize (with all legacy aliases) and encrypt a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the payload cannot be serialized.
    pub fn encode(&self, payload: &SessionPayload) -> Result<String, Error> {
        let json = wire::to_json(payload)?;
        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(Cookie::new(SEAL_NAME, json));
        jar.get(SEAL_NAME)
            .map(|sealed| sealed.value().to_owned())
            .ok_or_else(|| Error::Encoding("sealed value missing from jar".into()))
    }

    /// Decode a cookie value produced by [`encode`](Self::encode) or by the legacy scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if neither path accepts the value.
    pub fn decode(&self, raw: &str) -> Result<SessionPayload, Error> {
        self.decode_tagged(raw).map(EncodedSession::into_payload)
    }

    /// Like [`decode`](Self::decode), but reports which format matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSession`] if neither path accepts the value.
    pub fn decode_tagged(&self, raw: &str) -> Result<EncodedSession, Error> {
        if let Some(json) = self.open(raw) {
            return wire::from_json(json.as_bytes()).map(EncodedSession::V1);
        }
        if !self.accept_legacy {
            return Err(Error::InvalidSession("authentication failed".into()));
        }
        decode_legacy(raw).map(EncodedSession::Legacy)
    }

    fn open(&self, raw: &str) -> Option<String> {
        let mut jar = CookieJar::new();
        jar.add_original(Cookie::new(SEAL_NAME, raw.to_owned()));
        jar.private(&self.key)
            .get(SEAL_NAME)
            .map(|opened| opened.value().to_owned())
    }
}

/// Pre-encryption format: base64 of the JSON payload, possibly percent-encoded.
fn decode_legacy(raw: &str) -> Result<SessionPayload, Error> {
    let unescaped = urlencoding::decode(raw)
        .map_err(|_| Error::InvalidSession("neither encrypted nor legacy encoding".into()))?;
    let bytes = STANDARD
        .decode(unescaped.trim())
        .or_else(|_| URL_SAFE.decode(unescaped.trim()))
        .map_err(|_| Error::InvalidSession("neither encrypted nor legacy encoding".into()))?;
    wire::from_json(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::SessionUser;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef-test-secret";

    fn codec() -> SessionCodec {
        SessionCodec::from_secret(SECRET).unwrap()
    }

    fn payload() -> SessionPayload {
        let mut p = SessionPayload::new(
            SessionUser::new("a@b.com", "auth0|1")
                .with_name("Ada")
                .with_picture("https://cdn.example.com/a.png")
                .with_email_verified(true),
        )
        .with_access_token("tok1")
        .with_tenant_id("tenant-9");
        p.id_token = Some("id.jwt".into());
        p.subscription_plan = Some("enterprise".into());
        p.business_name = Some("Acme".into());
        p.business_type = Some("retail".into());
        p
    }

    fn legacy(payload: &SessionPayload) -> String {
        STANDARD.encode(wire::to_json(payload).unwrap())
    }

    #[test]
    fn round_trip() {
        let codec = codec();
        for p in [payload(), payload().completed(), SessionPayload::new(SessionUser::new("x@y.z", "google|7"))] {
            let encoded = codec.encode(&p).unwrap();
            assert_eq!(codec.decode(&encoded).unwrap(), p);
        }
    }

    #[test]
    fn encoded_value_is_opaque() {
        let encoded = codec().encode(&payload()).unwrap();
        assert!(!encoded.contains("a@b.com"));
        assert!(!encoded.contains("tenant-9"));
    }

    #[test]
    fn encryption_is_randomized() {
        let codec = codec();
        assert_ne!(codec.encode(&payload()).unwrap(), codec.encode(&payload()).unwrap());
    }

    #[test]
    fn encrypted_value_is_tagged_v1() {
        let codec = codec();
        let encoded = codec.encode(&payload()).unwrap();
        assert!(matches!(codec.decode_tagged(&encoded).unwrap(), EncodedSession::V1(_)));
    }

    #[test]
    fn legacy_value_still_decodes() {
        let codec = codec();
        let decoded = codec.decode_tagged(&legacy(&payload())).unwrap();
        assert!(decoded.is_legacy());
        assert_eq!(decoded.into_payload(), payload());
    }

    #[test]
    fn percent_encoded_legacy_value_decodes() {
        let raw = urlencoding::encode(&legacy(&payload())).into_owned();
        assert_eq!(codec().decode(&raw).unwrap(), payload());
    }

    #[test]
    fn legacy_rejected_once_fallback_disabled() {
        let codec = codec().with_legacy_fallback(false);
        let err = codec.decode(&legacy(&payload())).unwrap_err();
        assert!(matches!(err, Error::InvalidSession(_)));
    }

    #[test]
    fn garbage_is_invalid_session() {
        for raw in ["", "garbage!!", "bm90IGpzb24=", "e30="] {
            assert!(
                matches!(codec().decode(raw), Err(Error::InvalidSession(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn other_key_cannot_decrypt() {
        let encoded = codec().encode(&payload()).unwrap();
        let other = SessionCodec::from_secret(b"ffffffffffffffffffffffffffffffff-other").unwrap();
        assert!(matches!(other.decode(&encoded), Err(Error::InvalidSession(_))));
    }

    #[test]
    fn tampered_value_is_rejected() {
        let codec = codec();
        let mut encoded = codec.encode(&payload()).unwrap().into_bytes();
        let mid = encoded.len() / 2;
        encoded[mid] = if encoded[mid] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(encoded).unwrap();
        assert!(codec.decode(&tampered).is_err());
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(SessionCodec::from_secret(b"too-short"), Err(Error::Key(_))));
    }
}
