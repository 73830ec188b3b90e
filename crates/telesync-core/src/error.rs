// ── Core error types ──
//
// Errors surfaced to callers of telesync-core. Transport details (raw
// status classes, reqwest failures) are folded into these variants by
// the `From<telesync_api::Error>` impl before a completion sees them.

use thiserror::Error;

use crate::storage::StorageError;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    // ── Precondition errors ──────────────────────────────────────────
    #[error("There are no available credentials")]
    NoCredentials,

    #[error("There is no push token available")]
    NoPushToken,

    #[error("There are no events to track")]
    NoEvents,

    #[error("Too many types of events -- can only handle one type at a time")]
    TooManyEventTypes,

    // ── Service errors ───────────────────────────────────────────────
    #[error("Authentication failed: {detail}")]
    AuthFailed { detail: String },

    // ── Local errors ─────────────────────────────────────────────────
    #[error("Operation cancelled before it started")]
    Cancelled,

    #[error("Storage error: {detail}")]
    Storage { detail: String },

    #[error("Error: {detail}")]
    Other { detail: String },
}

impl CoreError {
    pub(crate) fn other(detail: impl Into<String>) -> Self {
        Self::Other {
            detail: detail.into(),
        }
    }

    /// Error reported for operations submitted to a stopped queue.
    pub(crate) fn queue_closed() -> Self {
        Self::other("queue closed")
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<telesync_api::Error> for CoreError {
    fn from(err: telesync_api::Error) -> Self {
        match err {
            telesync_api::Error::Unauthorized => CoreError::AuthFailed {
                detail: "auth token rejected".into(),
            },
            telesync_api::Error::InvalidResponse { status: 401, body } => {
                CoreError::AuthFailed { detail: body }
            }
            telesync_api::Error::InvalidResponse { status, body } => {
                CoreError::other(format!("[HTTP {status}]: {body}"))
            }
            other => CoreError::other(other.to_string()),
        }
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        CoreError::Storage {
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_response_maps_to_http_detail() {
        let err: CoreError = telesync_api::Error::InvalidResponse {
            status: 422,
            body: "bad device".into(),
        }
        .into();
        assert_eq!(err, CoreError::other("[HTTP 422]: bad device"));
        assert_eq!(err.to_string(), "Error: [HTTP 422]: bad device");
    }

    #[test]
    fn rejected_token_maps_to_auth_failed() {
        let err: CoreError = telesync_api::Error::Unauthorized.into();
        assert!(matches!(err, CoreError::AuthFailed { .. }));

        let err: CoreError = telesync_api::Error::InvalidResponse {
            status: 401,
            body: "expired".into(),
        }
        .into();
        assert_eq!(
            err,
            CoreError::AuthFailed {
                detail: "expired".into()
            }
        );
    }

    #[test]
    fn other_transport_errors_keep_description() {
        let err: CoreError = telesync_api::Error::Unreachable {
            reason: "connection refused".into(),
        }
        .into();
        assert_eq!(
            err,
            CoreError::other("Service unreachable: connection refused")
        );
    }
}
