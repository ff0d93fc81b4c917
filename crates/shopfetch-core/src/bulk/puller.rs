//! Bulk puller
//!
//! Drives one asynchronous bulk query from submission to staged records:
//!
//! 1. Submit. A rejection classified as blocked/throttled backs off and
//!    re-submits inside a bounded retry budget; any other rejection shape
//!    surfaces immediately.
//! 2. Poll at a fixed interval until the job reaches a terminal status.
//! 3. Download the newline-delimited result and parse each line
//!    independently: a malformed line is counted and skipped, it does not
//!    abort the pull.
//! 4. Hand every parsed record to the module's router, then finish the
//!    router so buffered staging writes flush.

use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use crate::api::types::{BulkJobRef, BulkJobStatus, BulkSubmission};
use crate::api::Transport;
use crate::bulk::classify::classify_rejection;
use crate::bulk::RecordRouter;
use crate::config::PullConfig;
use crate::stats::PullStats;
use shopfetch_common::{BulkConflictKind, PullError, Result};

/// One-shot driver for a bulk query. Cheap to construct per invocation;
/// retries create a new job of the same shape rather than reusing state.
pub struct BulkPuller<'a> {
    transport: &'a dyn Transport,
    config: &'a PullConfig,
}

impl<'a> BulkPuller<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a PullConfig) -> Self {
        Self { transport, config }
    }

    /// Run the full lifecycle for `query`, routing parsed records through
    /// `router`.
    pub async fn pull(
        &self,
        query: &str,
        router: &mut dyn RecordRouter,
        stats: &mut PullStats,
    ) -> Result<()> {
        let job = self.submit_with_retry(query, stats).await?;
        tracing::info!(job_id = %job.id, "Bulk operation accepted");

        let url = self.await_completion(&job).await?;

        match url {
            Some(url) => {
                let body = self.transport.download_bulk_result(&url).await?;
                tracing::info!(job_id = %job.id, bytes = body.len(), "Bulk result downloaded");
                self.ingest(&body, router, stats).await?;
            }
            None => {
                tracing::info!(job_id = %job.id, "Bulk operation completed with no result data");
            }
        }

        router.finish(stats).await?;
        Ok(())
    }

    /// Submit once. Conflicts come back as `PullError::BulkConflict` for the
    /// retry loop; unclassifiable rejections surface as-is.
    async fn submit_once(&self, query: &str) -> Result<BulkJobRef> {
        match self.transport.submit_bulk_query(query).await? {
            BulkSubmission::Accepted(job) => Ok(job),
            BulkSubmission::Rejected(errors) => match classify_rejection(&errors) {
                Some(kind) => Err(PullError::BulkConflict(kind)),
                None => Err(PullError::UnexpectedResponse {
                    message: format!(
                        "Bulk submission rejected with {} unclassified error(s)",
                        errors.len()
                    ),
                    errors: errors.into_iter().map(|e| e.message).collect(),
                }),
            },
        }
    }

    async fn submit_with_retry(&self, query: &str, stats: &mut PullStats) -> Result<BulkJobRef> {
        let mut conflicts: u32 = 0;

        loop {
            match self.submit_once(query).await {
                Ok(job) => return Ok(job),
                Err(PullError::BulkConflict(kind)) => {
                    conflicts += 1;
                    stats.inc_warning();

                    if conflicts >= self.config.max_bulk_attempts {
                        return Err(PullError::Api {
                            message: format!(
                                "Bulk submission still {} after {} attempt(s)",
                                kind, conflicts
                            ),
                            response: None,
                        });
                    }

                    let backoff_ms = match kind {
                        BulkConflictKind::Blocked => self.config.blocked_backoff_ms,
                        BulkConflictKind::Throttled => self.config.throttled_backoff_ms,
                    };
                    tracing::warn!(
                        conflict = %kind,
                        attempt = conflicts,
                        max_attempts = self.config.max_bulk_attempts,
                        backoff_ms,
                        "Bulk submission conflict, backing off before re-submit"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Poll until terminal. Returns the result URL, or `None` for an empty
    /// completed result.
    async fn await_completion(&self, job: &BulkJobRef) -> Result<Option<String>> {
        loop {
            match self.transport.poll_bulk_job(job).await? {
                BulkJobStatus::Completed { url, object_count } => {
                    tracing::info!(
                        job_id = %job.id,
                        object_count = object_count.unwrap_or(0),
                        "Bulk operation completed"
                    );
                    return Ok(url);
                }
                BulkJobStatus::Failed { error_code } => {
                    return Err(PullError::Api {
                        message: format!(
                            "Bulk operation {} failed remotely ({})",
                            job.id,
                            error_code.as_deref().unwrap_or("no error code")
                        ),
                        response: None,
                    });
                }
                BulkJobStatus::Canceled => {
                    return Err(PullError::Api {
                        message: format!("Bulk operation {} was canceled", job.id),
                        response: None,
                    });
                }
                status @ (BulkJobStatus::Created
                | BulkJobStatus::Running
                | BulkJobStatus::Canceling) => {
                    tracing::debug!(job_id = %job.id, status = ?status, "Bulk operation pending");
                    sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
                }
            }
        }
    }

    /// Parse the newline-delimited result body line by line.
    async fn ingest(
        &self,
        body: &[u8],
        router: &mut dyn RecordRouter,
        stats: &mut PullStats,
    ) -> Result<()> {
        let text = String::from_utf8_lossy(body);

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(record) => router.route(record, stats).await?,
                Err(e) => {
                    stats.inc_general_error();
                    tracing::warn!(error = %e, "Skipping malformed bulk result line");
                }
            }
        }
        Ok(())
    }
}
