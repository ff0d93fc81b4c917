//! Remote Admin API surface
//!
//! The pipeline talks to the platform exclusively through the [`Transport`]
//! trait: an asynchronous bulk query lifecycle (submit, poll, download) plus
//! a paginated REST fallback for endpoints the bulk API does not cover.
//! [`client::AdminClient`] is the production implementation; tests substitute
//! their own.

pub mod client;
pub mod types;

use async_trait::async_trait;
use shopfetch_common::Result;

pub use client::AdminClient;
pub use types::{ApiUserError, BulkJobRef, BulkJobStatus, BulkSubmission, Page};

/// Narrow transport contract consumed by the pull pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit an asynchronous bulk query. A rejection with user errors is a
    /// normal outcome here, not an `Err`; the puller classifies it.
    async fn submit_bulk_query(&self, query: &str) -> Result<BulkSubmission>;

    /// Fetch the current status of a previously submitted bulk job.
    async fn poll_bulk_job(&self, job: &BulkJobRef) -> Result<BulkJobStatus>;

    /// Download a completed bulk result: newline-delimited JSON records.
    async fn download_bulk_result(&self, url: &str) -> Result<Vec<u8>>;

    /// Issue a paginated REST request. `params` are query parameters; the
    /// returned page carries the cursor for the next one, if any.
    async fn request(&self, method: &str, path: &str, params: &[(String, String)])
        -> Result<Page>;
}
