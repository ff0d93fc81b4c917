//! Error types for the pull pipeline
//!
//! The taxonomy separates remote rejections (`Api`, `UnexpectedResponse`,
//! `BulkConflict`) from local failures (`Validation`, `StagingWrite`,
//! `Database`, `Infrastructure`). Only bulk conflicts are ever retried, and
//! only inside the bulk puller; everything else aborts the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pull operations
pub type Result<T> = std::result::Result<T, PullError>;

/// Maximum length of an outward-facing error message, in bytes.
pub const MAX_ENVELOPE_MESSAGE_LEN: usize = 800;

/// The two narrowly-detected retryable rejection reasons for a bulk
/// submission. Anything else is never auto-retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkConflictKind {
    /// Another bulk query is already running for this shop.
    Blocked,
    /// The submission was rate-limit throttled.
    Throttled,
}

impl std::fmt::Display for BulkConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BulkConflictKind::Blocked => write!(f, "blocked"),
            BulkConflictKind::Throttled => write!(f, "throttled"),
        }
    }
}

/// Main error type for the pull pipeline
#[derive(Error, Debug)]
pub enum PullError {
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote API rejected a call. Carries the raw response body when
    /// one was available.
    #[error("api error: {message}")]
    Api {
        message: String,
        response: Option<serde_json::Value>,
    },

    /// The remote response violated the expected contract. Carries the raw
    /// error list so the caller can log exactly what came back.
    #[error("unexpected api response: {message}")]
    UnexpectedResponse {
        message: String,
        errors: Vec<String>,
    },

    /// A retryable bulk submission conflict. Consumed by the puller's retry
    /// loop; surfaces only if the caller bypasses that loop.
    #[error("bulk operation conflict: {0}")]
    BulkConflict(BulkConflictKind),

    /// A staging insert failed. Fatal: records are never silently dropped.
    #[error("staging write failed on table {table}: {source}")]
    StagingWrite {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("network error: {0}")]
    Network(String),

    /// Catch-all for unanticipated internal failures. The message here is
    /// logged in full but replaced with generic wording at the boundary.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl PullError {
    /// Stable machine-readable code for the boundary envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            PullError::Validation(_) => "validation_error",
            PullError::Api { .. } => "api_error",
            PullError::UnexpectedResponse { .. } => "unexpected_response",
            PullError::BulkConflict(_) => "bulk_conflict",
            PullError::StagingWrite { .. } => "staging_write_error",
            PullError::Database(_) => "database_error",
            PullError::Network(_) => "network_error",
            PullError::Infrastructure(_) => "infrastructure_error",
        }
    }

    /// Whether the puller's bounded retry loop may re-submit after this
    /// error. True only for the two bulk conflict kinds.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PullError::BulkConflict(_))
    }
}

/// Error envelope handed across the process boundary on fatal abort.
///
/// Internal failure detail (database, infrastructure) is deliberately
/// replaced with generic wording; the full error is expected to be logged by
/// the boundary before conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_code: String,
    pub error_message: String,
}

impl ErrorEnvelope {
    pub fn from_error(err: &PullError) -> Self {
        let message = match err {
            PullError::Database(_) | PullError::Infrastructure(_) => {
                "An internal error occurred while processing the request".to_string()
            }
            PullError::StagingWrite { table, .. } => {
                format!("Failed to write staged records to table {}", table)
            }
            other => other.to_string(),
        };

        Self {
            error_code: err.error_code().to_string(),
            error_message: truncate_message(message),
        }
    }
}

/// Truncate to `MAX_ENVELOPE_MESSAGE_LEN` bytes on a char boundary.
fn truncate_message(mut message: String) -> String {
    if message.len() <= MAX_ENVELOPE_MESSAGE_LEN {
        return message;
    }
    let mut end = MAX_ENVELOPE_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message.truncate(end);
    message
}
