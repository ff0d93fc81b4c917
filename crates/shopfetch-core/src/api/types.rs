//! Wire types for the Admin API

use serde::Deserialize;

/// A user-facing error returned with a rejected mutation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiUserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl ApiUserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }
}

/// Outcome of submitting a bulk query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkSubmission {
    /// The job was accepted and is now queued or running.
    Accepted(BulkJobRef),
    /// The platform rejected the submission with user errors.
    Rejected(Vec<ApiUserError>),
}

/// Handle to one in-flight bulk operation. Never persisted; a retry creates
/// a fresh job of the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkJobRef {
    pub id: String,
}

/// Remote status of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkJobStatus {
    Created,
    Running,
    Canceling,
    /// Terminal: result ready. `url` is absent when the query matched
    /// nothing.
    Completed {
        url: Option<String>,
        object_count: Option<i64>,
    },
    /// Terminal: the job failed remotely.
    Failed { error_code: Option<String> },
    /// Terminal: canceled out-of-band.
    Canceled,
}

impl BulkJobStatus {
    /// Build a status from the raw fields of a bulk operation node.
    pub fn from_parts(
        status: &str,
        url: Option<String>,
        error_code: Option<String>,
        object_count: Option<i64>,
    ) -> Option<Self> {
        match status {
            "CREATED" => Some(BulkJobStatus::Created),
            "RUNNING" => Some(BulkJobStatus::Running),
            "CANCELING" => Some(BulkJobStatus::Canceling),
            "COMPLETED" => Some(BulkJobStatus::Completed { url, object_count }),
            "FAILED" => Some(BulkJobStatus::Failed { error_code }),
            "CANCELED" | "EXPIRED" => Some(BulkJobStatus::Canceled),
            _ => None,
        }
    }

    /// Whether polling should stop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BulkJobStatus::Completed { .. } | BulkJobStatus::Failed { .. } | BulkJobStatus::Canceled
        )
    }
}

/// One page of a paginated REST response.
#[derive(Debug, Clone)]
pub struct Page {
    /// Decoded response body.
    pub body: serde_json::Value,
    /// Cursor for the next page, when the response advertised one.
    pub next_page: Option<String>,
}
