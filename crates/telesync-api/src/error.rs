use thiserror::Error;

/// HTTP status codes the service uses to signal a transient server-side
/// condition. Requests failing with one of these are safe to retry.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Returns `true` if `status` is in [`RETRYABLE_STATUS_CODES`].
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Transport-level error for the `telesync-api` crate.
///
/// Describes what the network or the response decoder observed. Callers of
/// `telesync-core` never see these directly -- they are mapped into
/// `CoreError` before reaching a completion.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The service rejected the auth token (HTTP 401).
    #[error("Unauthorized -- auth token rejected")]
    Unauthorized,

    // ── Transport ───────────────────────────────────────────────────
    /// Connection failed or timed out before a response arrived.
    #[error("Service unreachable: {reason}")]
    Unreachable { reason: String },

    // ── Response ────────────────────────────────────────────────────
    /// Non-success status other than 401.
    #[error("Invalid response (HTTP {status}): {body}")]
    InvalidResponse { status: u16, body: String },

    /// Success status but an empty body where a value was expected.
    #[error("Response contained no data")]
    NoData,

    /// Success status but the body did not decode, with the raw body for debugging.
    #[error("Could not parse response: {body}")]
    CouldNotParse { body: String },

    // ── Catch-all ───────────────────────────────────────────────────
    #[error("Request failed: {0}")]
    Other(String),
}

impl Error {
    /// Returns `true` if this error means the auth token expired and a
    /// token refresh might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable { .. } => true,
            Self::InvalidResponse { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// The HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::InvalidResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Self::Unreachable {
                reason: err.to_string(),
            }
        } else {
            Self::Other(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Other(format!("invalid URL: {err}"))
    }
}
