use serde::Serialize;

/// Body of `GET {auth_path}/session`.
///
/// `session` is the wire representation of the payload with tokens removed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<serde_json::Value>,
}

impl SessionStatus {
    pub(super) fn authenticated(session: serde_json::Value) -> Self {
        Self {
            authenticated: true,
            session: Some(session),
        }
    }

    pub(super) fn anonymous() -> Self {
        Self {
            authenticated: false,
            session: None,
        }
    }
}

/// Body of `POST {auth_path}/session/update`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub success: bool,
    pub message: String,
}

impl UpdateResult {
    pub(super) fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub(super) fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
