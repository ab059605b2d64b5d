//! Response bodies.

use serde::{Deserialize, Serialize};

/// What the receiver did with an applied event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    /// A new account was created.
    Created,
    /// An existing account was updated.
    Updated,
    /// The account was deleted.
    Deleted,
}

/// Body of a successful (HTTP 200) receive call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiveResponse {
    /// Whether the change took effect.
    pub success: bool,
    /// ID of the created or updated account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    /// What was done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ApplyAction>,
    /// Informational message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ReceiveResponse {
    /// An account was created.
    pub fn created(user_id: u64) -> Self {
        Self {
            success: true,
            user_id: Some(user_id),
            action: Some(ApplyAction::Created),
            message: None,
        }
    }

    /// An account was updated.
    pub fn updated(user_id: u64) -> Self {
        Self {
            success: true,
            user_id: Some(user_id),
            action: Some(ApplyAction::Updated),
            message: None,
        }
    }

    /// A deletion was attempted.
    pub fn deleted(success: bool) -> Self {
        Self {
            success,
            user_id: None,
            action: Some(ApplyAction::Deleted),
            message: None,
        }
    }

    /// The account to delete does not exist. Not an HTTP error.
    pub fn not_found() -> Self {
        Self {
            success: false,
            user_id: None,
            action: None,
            message: Some("User not found".into()),
        }
    }
}

/// Body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Software version of the responder.
    pub version: String,
    /// Responder's current time, `YYYY-MM-DD HH:MM:SS`.
    pub time: String,
}

impl HealthResponse {
    /// Creates a healthy response.
    pub fn ok(version: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            status: "ok".into(),
            version: version.into(),
            time: time.into(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code, e.g. `invalid_api_key`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Extra data.
    pub data: ErrorData,
}

/// Extra data attached to an error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// HTTP status of the response.
    pub status: u16,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: ErrorData { status },
        }
    }
}
