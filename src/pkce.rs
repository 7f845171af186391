use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// `N` random bytes, base64url without padding.
fn random_token<const N: usize>() -> String {
    let random_bytes: [u8; N] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// PKCE verifier with its S256 challenge.
///
/// The verifier stays in a transient cookie until the code exchange; only
/// the challenge goes to the identity provider.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    #[must_use]
    pub fn generate() -> Self {
        let verifier = generate_code_verifier();
        let challenge = generate_code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

/// Generates a cryptographically random code verifier for PKCE.
///
/// Returns a 64-character URL-safe string (RFC 7636 compliant, 43-128 chars).
#[must_use]
pub fn generate_code_verifier() -> String {
    random_token::<48>()
}

/// Computes the S256 code challenge from a code verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Generates the OAuth2 `state` parameter (22 chars).
///
/// Echoed back on the exchange request and compared with the state cookie.
#[must_use]
pub fn generate_state() -> String {
    random_token::<16>()
}

/// Generates the OpenID Connect `nonce` bound into the provider's ID token.
#[must_use]
pub fn generate_nonce() -> String {
    random_token::<16>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_length_and_alphabet() {
        let verifier = generate_code_verifier();
        assert_eq!(verifier.len(), 64);
        assert!(
            verifier
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "verifier should be URL-safe: {verifier}"
        );
    }

    #[test]
    fn challenge_matches_rfc7636_vector() {
        // RFC 7636 Appendix B
        let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn generated_pair_is_consistent() {
        let pair = PkceChallenge::generate();
        assert_eq!(pair.challenge, generate_code_challenge(&pair.verifier));
        assert_ne!(pair.verifier, PkceChallenge::generate().verifier);
    }

    #[test]
    fn state_and_nonce_are_unique() {
        let state = generate_state();
        let nonce = generate_nonce();
        assert_eq!(state.len(), 22);
        assert_eq!(nonce.len(), 22);
        assert_ne!(state, nonce);
        assert_ne!(state, generate_state());
    }
}
