//! Error types for the inbound side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;
use usersync_protocol::{ErrorBody, ProtocolError};

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Reasons an inbound request is not authorized.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// Too many requests from this IP in the current window.
    #[error("Rate limit exceeded. Try again later.")]
    RateLimitExceeded,

    /// The caller's IP is not on the allow-list.
    #[error("IP address not authorized")]
    IpNotWhitelisted,

    /// No `X-API-Key` header.
    #[error("API key is required")]
    MissingApiKey,

    /// `X-API-Key` does not match.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Signing is required but a header is missing.
    #[error("Request signature required")]
    MissingSignature,

    /// `X-Timestamp` is outside the tolerance.
    #[error("Request expired")]
    ExpiredRequest,

    /// `X-Signature` does not match.
    #[error("Invalid request signature")]
    InvalidSignature,
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::RateLimitExceeded => "rate_limit_exceeded",
            AuthError::IpNotWhitelisted => "ip_not_whitelisted",
            AuthError::MissingApiKey => "missing_api_key",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::MissingSignature => "missing_signature",
            AuthError::ExpiredRequest => "expired_request",
            AuthError::InvalidSignature => "invalid_signature",
        }
    }

    /// HTTP status.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::RateLimitExceeded => 429,
            AuthError::MissingApiKey | AuthError::MissingSignature | AuthError::ExpiredRequest => {
                401
            }
            AuthError::IpNotWhitelisted | AuthError::InvalidApiKey | AuthError::InvalidSignature => {
                403
            }
        }
    }
}

/// Errors surfaced to inbound callers.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Authentication failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The event is not an object or lacks identity fields.
    #[error("{0}")]
    InvalidData(String),

    /// The event names an unknown action.
    #[error("Invalid action")]
    InvalidAction(String),

    /// The encrypted envelope could not be opened.
    #[error("Failed to decrypt data")]
    DecryptionFailed,

    /// The account store rejected the change.
    #[error("{0}")]
    ApplyFailed(String),

    /// No route matches the path.
    #[error("No route was found matching the URL and request method")]
    NoRoute,

    /// The route exists but not for this method.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Auth(e) => e.code(),
            ServerError::InvalidData(_) => "invalid_data",
            ServerError::InvalidAction(_) => "invalid_action",
            ServerError::DecryptionFailed => "decryption_failed",
            ServerError::ApplyFailed(_) => "apply_failed",
            ServerError::NoRoute => "rest_no_route",
            ServerError::MethodNotAllowed => "method_not_allowed",
            ServerError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::Auth(e) => e.status(),
            ServerError::InvalidData(_)
            | ServerError::InvalidAction(_)
            | ServerError::DecryptionFailed => 400,
            ServerError::NoRoute => 404,
            ServerError::MethodNotAllowed => 405,
            ServerError::ApplyFailed(_) | ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status() >= 500
    }

    /// The JSON error body.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.code(), self.to_string(), self.status())
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidData(message) => ServerError::InvalidData(message),
            ProtocolError::UnknownAction(action) => ServerError::InvalidAction(action),
            ProtocolError::Decryption(_) => ServerError::DecryptionFailed,
            ProtocolError::Encryption(e) => ServerError::Internal(e.to_string()),
            ProtocolError::Signing(message) => ServerError::Internal(message),
            ProtocolError::Json(e) => ServerError::InvalidData(e.to_string()),
        }
    }
}

impl From<usersync_core::CoreError> for ServerError {
    fn from(err: usersync_core::CoreError) -> Self {
        ServerError::ApplyFailed(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_and_statuses() {
        let table = [
            (AuthError::RateLimitExceeded, "rate_limit_exceeded", 429),
            (AuthError::IpNotWhitelisted, "ip_not_whitelisted", 403),
            (AuthError::MissingApiKey, "missing_api_key", 401),
            (AuthError::InvalidApiKey, "invalid_api_key", 403),
            (AuthError::MissingSignature, "missing_signature", 401),
            (AuthError::ExpiredRequest, "expired_request", 401),
            (AuthError::InvalidSignature, "invalid_signature", 403),
        ];
        for (err, code, status) in table {
            assert_eq!(err.code(), code);
            assert_eq!(err.status(), status);
        }
    }

    #[test]
    fn error_classification() {
        assert!(ServerError::from(AuthError::InvalidApiKey).is_client_error());
        assert!(ServerError::DecryptionFailed.is_client_error());
        assert!(ServerError::ApplyFailed("duplicate".into()).is_server_error());
        assert!(!ServerError::NoRoute.is_server_error());
    }

    #[test]
    fn body_carries_code_and_status() {
        let body = ServerError::InvalidAction("explode".into()).to_body();
        assert_eq!(body.code, "invalid_action");
        assert_eq!(body.message, "Invalid action");
        assert_eq!(body.data.status, 400);

        let body = ServerError::from(AuthError::ExpiredRequest).to_body();
        assert_eq!(body.message, "Request expired");
    }

    #[test]
    fn protocol_errors_map_to_client_errors() {
        let err: ServerError = ProtocolError::InvalidData("user_login and user_email are required".into()).into();
        assert_eq!(err.code(), "invalid_data");
        let err: ServerError = ProtocolError::UnknownAction("x".into()).into();
        assert_eq!(err.status(), 400);
    }
}
