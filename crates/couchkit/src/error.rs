//! Error types for CouchDB operations

use serde::Deserialize;
use thiserror::Error;

/// Result type for CouchDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client
#[derive(Error, Debug)]
pub enum Error {
    /// Local precondition failure; never reaches the network
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested database or document does not exist (HTTP 404)
    #[error("not found: {reason}")]
    NotFound { reason: String },

    /// Revision mismatch on a write or delete (HTTP 409)
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// Missing or insufficient credentials (HTTP 401/403)
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Any other non-success response from the server
    #[error("server error ({status}): {error}: {reason}")]
    Server {
        status: u16,
        error: String,
        reason: String,
    },

    /// Network, TLS, or timeout failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(String),

    /// URL construction error
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns true if this is a local validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Returns true if the server reported the resource missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if the server reported a revision conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}

/// Error body CouchDB attaches to non-success responses
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

/// Map a non-success HTTP response to an [`Error`].
///
/// CouchDB reports failures as `{"error": ..., "reason": ...}`; a body that
/// does not parse still yields the status-derived variant.
pub(crate) fn from_status(status: u16, body: &[u8]) -> Error {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let reason = if parsed.reason.is_empty() {
        parsed.error.clone()
    } else {
        parsed.reason
    };
    match status {
        404 => Error::NotFound { reason },
        409 => Error::Conflict { reason },
        401 | 403 => Error::Unauthorized { reason },
        _ => Error::Server {
            status,
            error: parsed.error,
            reason,
        },
    }
}

/// Pre-flight check that a required field was set and is non-empty.
pub(crate) fn ensure_not_empty(value: Option<&str>, field: &str) -> Result<()> {
    match value {
        Some(v) if !v.is_empty() => Ok(()),
        _ => Err(Error::Validation(format!("{field} may not be empty"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_couch_errors() {
        let body = br#"{"error":"not_found","reason":"missing"}"#;
        let err = from_status(404, body);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: missing");

        let body = br#"{"error":"conflict","reason":"Document update conflict."}"#;
        assert!(from_status(409, body).is_conflict());

        let err = from_status(401, br#"{"error":"unauthorized"}"#);
        assert!(matches!(err, Error::Unauthorized { .. }));

        let err = from_status(500, b"not json at all");
        match err {
            Error::Server { status, .. } => assert_eq!(status, 500),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_ensure_not_empty() {
        assert!(ensure_not_empty(Some("db"), "source").is_ok());
        assert!(ensure_not_empty(Some(""), "source")
            .unwrap_err()
            .is_validation());
        assert!(ensure_not_empty(None, "target").unwrap_err().is_validation());
    }
}
