#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The payload could not be serialized. Never expected for well-formed payloads.
    #[error("Session encoding error: {0}")]
    Encoding(String),
    /// Neither the encrypted nor the legacy decoding path accepted the cookie value.
    #[error("Invalid session: {0}")]
    InvalidSession(String),
    #[error("Invalid session key: {0}")]
    Key(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed (status {status:?}): {detail}")]
    Exchange {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },
}
