//! Client error types

use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to connect to the server. Please check your internet connection.";
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";
pub const UNEXPECTED_RESPONSE_MESSAGE: &str = "Received an unexpected response from the server.";

/// Per-field validation messages reported by the server
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Normalized error returned by every client call.
///
/// `status` is the HTTP status code, or 0 when no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub errors: Option<FieldErrors>,
}

/// Coarse classification of an [`ApiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Validation,
    RateLimited,
    Server,
    Other,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            errors: None,
        }
    }

    /// Build an error from a failed response.
    ///
    /// The message comes from the body's `message` or `error` field, falling
    /// back to [`default_message`].
    #[must_use]
    pub fn from_response(status: StatusCode, body: &Value) -> Self {
        let message = ["message", "error"]
            .iter()
            .find_map(|field| {
                body.get(*field)
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
            })
            .map_or_else(|| default_message(status.as_u16()).to_string(), str::to_string);

        Self {
            message,
            status: status.as_u16(),
            errors: body.get("errors").and_then(field_errors),
        }
    }

    /// The server could not be reached or the response could not be read
    #[must_use]
    pub fn network() -> Self {
        Self::new(NETWORK_ERROR_MESSAGE, 0)
    }

    /// Refresh failed after a 401; the session has been cleared
    #[must_use]
    pub fn session_expired() -> Self {
        Self::new(SESSION_EXPIRED_MESSAGE, StatusCode::UNAUTHORIZED.as_u16())
    }

    /// A successful response whose body did not match the expected shape
    #[must_use]
    pub fn unexpected_response(status: StatusCode) -> Self {
        Self::new(UNEXPECTED_RESPONSE_MESSAGE, status.as_u16())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self.status {
            0 => ErrorKind::Network,
            400 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            422 => ErrorKind::Validation,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    /// Check if this error means the caller must sign in again
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    #[must_use]
    pub const fn is_network(&self) -> bool {
        self.status == 0
    }

    /// Messages reported for a single field
    #[must_use]
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors
            .as_ref()
            .and_then(|errors| errors.get(field))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// User-facing message for a status code when the body carries none
#[must_use]
pub const fn default_message(status: u16) -> &'static str {
    match status {
        400 => "Invalid request. Please check your input.",
        401 => "Authentication required. Please log in.",
        403 => "You do not have permission to perform this action.",
        404 => "The requested resource was not found.",
        409 => "A conflict occurred. The resource may already exist.",
        422 => "Validation failed. Please check your input.",
        429 => "Too many requests. Please try again later.",
        500 => "An internal server error occurred. Please try again.",
        502 => "Service temporarily unavailable. Please try again.",
        503 => "Service is currently unavailable. Please try again later.",
        _ => "An unexpected error occurred. Please try again.",
    }
}

/// Accepts `{"field": ["msg", ...]}` or `[{"field": "...", "message": "..."}]`
fn field_errors(value: &Value) -> Option<FieldErrors> {
    let mut errors = FieldErrors::new();
    match value {
        Value::Object(map) => {
            for (field, messages) in map {
                let entry = errors.entry(field.clone()).or_default();
                match messages {
                    Value::String(message) => entry.push(message.clone()),
                    Value::Array(items) => entry.extend(
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string),
                    ),
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                let field = item.get("field").and_then(Value::as_str).unwrap_or_default();
                if let Some(message) = item.get("message").and_then(Value::as_str) {
                    errors
                        .entry(field.to_string())
                        .or_default()
                        .push(message.to_string());
                }
            }
        }
        _ => return None,
    }
    Some(errors)
}

/// Errors raised while constructing an [`ApiClient`](super::ApiClient)
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("base_url is required")]
    MissingBaseUrl,

    #[error("invalid base_url `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn not_found_without_message_uses_default() {
        let error = ApiError::from_response(StatusCode::NOT_FOUND, &json!({}));
        assert_eq!(error.message, "The requested resource was not found.");
        assert_eq!(error.status, 404);
        assert_eq!(error.kind(), ErrorKind::NotFound);
        assert!(error.errors.is_none());
    }

    #[test]
    fn body_message_takes_precedence_over_error() {
        let error = ApiError::from_response(
            StatusCode::CONFLICT,
            &json!({"message": "Email taken", "error": "conflict"}),
        );
        assert_eq!(error.message, "Email taken");

        let error = ApiError::from_response(StatusCode::CONFLICT, &json!({"error": "conflict"}));
        assert_eq!(error.message, "conflict");
    }

    #[test]
    fn empty_message_falls_through_to_error() {
        let error = ApiError::from_response(
            StatusCode::CONFLICT,
            &json!({"message": "", "error": "conflict"}),
        );
        assert_eq!(error.message, "conflict");

        let error = ApiError::from_response(StatusCode::CONFLICT, &json!({"message": "", "error": ""}));
        assert_eq!(error.message, default_message(409));
    }

    #[test]
    fn default_message_table() {
        assert_eq!(default_message(400), "Invalid request. Please check your input.");
        assert_eq!(default_message(401), "Authentication required. Please log in.");
        assert_eq!(default_message(429), "Too many requests. Please try again later.");
        assert_eq!(
            default_message(503),
            "Service is currently unavailable. Please try again later."
        );
        assert_eq!(
            default_message(418),
            "An unexpected error occurred. Please try again."
        );
    }

    #[test]
    fn field_errors_from_map() {
        let error = ApiError::from_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            &json!({"errors": {"title": ["Title is required"], "email": "Invalid email"}}),
        );
        assert_eq!(error.field_errors("title"), ["Title is required".to_string()]);
        assert_eq!(error.field_errors("email"), ["Invalid email".to_string()]);
        assert!(error.field_errors("name").is_empty());
    }

    #[test]
    fn field_errors_from_list() {
        let error = ApiError::from_response(
            StatusCode::BAD_REQUEST,
            &json!({
                "detail": "Validation error",
                "errors": [
                    {"field": "password", "message": "too short"},
                    {"field": "password", "message": "needs a digit"}
                ]
            }),
        );
        assert_eq!(error.message, "Invalid request. Please check your input.");
        assert_eq!(error.field_errors("password").len(), 2);
    }

    #[test]
    fn network_error_has_status_zero() {
        let error = ApiError::network();
        assert!(error.is_network());
        assert_eq!(error.kind(), ErrorKind::Network);
        assert_eq!(error.to_string(), NETWORK_ERROR_MESSAGE);
    }

    #[test]
    fn session_expired_is_unauthorized() {
        let error = ApiError::session_expired();
        assert!(error.is_unauthorized());
        assert_eq!(error.message, SESSION_EXPIRED_MESSAGE);
    }
}
