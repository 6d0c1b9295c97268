//! Error taxonomy for calls to the library API.
//!
//! Every failure surfaced to the user resolves to a single line of text: the
//! server's own `message` when it sent one, otherwise a fallback chosen by the
//! operation that failed.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx response. `message` is the server-supplied text, if any.
    #[error("API error {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Status {
        status: u16,
        message: Option<String>,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid response format: {0}")]
    Decode(String),

    /// A protected call was attempted without a bearer token.
    #[error("Authentication required")]
    Unauthenticated,
}

impl ApiError {
    /// Build a status error from a raw response body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| server_message(&v));
        ApiError::Status { status, message }
    }

    /// The server's message, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text to show the user: the server message, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Unauthenticated => "Authentication required".to_string(),
            _ => self
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// True when the session behind the call is no longer valid.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. } | ApiError::Unauthenticated)
    }

    /// Message for a failed member-side return, keyed by status.
    pub fn return_message(&self) -> String {
        match self.status() {
            Some(404) => "Transaction not found".to_string(),
            Some(403) => "You are not authorized to return this book".to_string(),
            Some(400) => self
                .server_message()
                .unwrap_or("This book was already returned")
                .to_string(),
            _ => self.user_message("Failed to return book"),
        }
    }
}

/// Pull `message` (or `error`) out of a JSON error payload.
pub fn server_message(body: &Value) -> Option<String> {
    ["message", "error"].iter().find_map(|key| {
        body.get(*key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_uses_server_message() {
        let err = ApiError::from_status(422, r#"{"message":"The email has already been taken."}"#);
        assert_eq!(err.status(), Some(422));
        assert_eq!(
            err.user_message("Failed to add user"),
            "The email has already been taken."
        );
    }

    #[test]
    fn test_status_error_falls_back_to_error_field() {
        let err = ApiError::from_status(500, r#"{"error":"boom"}"#);
        assert_eq!(err.server_message(), Some("boom"));
    }

    #[test]
    fn test_fallback_when_body_is_not_json() {
        let err = ApiError::from_status(502, "<html>Bad Gateway</html>");
        assert_eq!(err.server_message(), None);
        assert_eq!(err.user_message("Failed to load books"), "Failed to load books");
    }

    #[test]
    fn test_fallback_for_transport_errors() {
        let err = ApiError::Transport("connection refused".to_string());
        assert_eq!(
            err.user_message("Failed to load dashboard statistics"),
            "Failed to load dashboard statistics"
        );
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(ApiError::from_status(401, "{}").is_unauthorized());
        assert!(ApiError::Unauthenticated.is_unauthorized());
        assert!(!ApiError::from_status(403, "{}").is_unauthorized());
    }

    #[test]
    fn test_return_messages_by_status() {
        assert_eq!(
            ApiError::from_status(404, "{}").return_message(),
            "Transaction not found"
        );
        assert_eq!(
            ApiError::from_status(403, r#"{"message":"nope"}"#).return_message(),
            "You are not authorized to return this book"
        );
        assert_eq!(
            ApiError::from_status(400, "{}").return_message(),
            "This book was already returned"
        );
        assert_eq!(
            ApiError::from_status(400, r#"{"message":"Already returned on Monday"}"#)
                .return_message(),
            "Already returned on Monday"
        );
        assert_eq!(
            ApiError::from_status(500, "{}").return_message(),
            "Failed to return book"
        );
    }
}
