//! Error types shared by the fetch and storage paths.

/// Why a single fetch invocation ended in `FetchStatus::Error`.
///
/// The `Display` text is what gets published, so it is written for people.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// The request never produced a response (timeout, DNS, refused, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("Error: {status} {reason}")]
    Http { status: u16, reason: String },

    /// A success status with nothing in the body.
    #[error("Error: {status} {reason} (empty response body)")]
    EmptyBody { status: u16, reason: String },

    /// The body was present but not a usable payload.
    #[error("Error: malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_network(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }

    /// HTTP status code, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Http { status, .. } | FetchError::EmptyBody { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    /// Drops the URL (it carries the API key) and keeps the cause chain,
    /// which is where "connection refused" and friends live.
    fn from(err: reqwest::Error) -> Self {
        use std::error::Error as _;

        let err = err.without_url();
        let mut detail = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };

        let mut source = err.source();
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }

        FetchError::Network(detail)
    }
}

/// Local persistence could not complete. Kept apart from `Ok(false)` so
/// "not found" and "disk failed" never look the same.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
