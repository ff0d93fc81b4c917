//! Asynchronous bulk query lifecycle
//!
//! - **classify**: narrow detection of the two retryable rejection reasons
//! - **puller**: the submit → poll → download → parse state machine
//!
//! The puller is module-agnostic: parsed records are handed to a
//! [`RecordRouter`] supplied by the owning module, which shapes them and
//! writes them into that module's staging tables.

pub mod classify;
pub mod puller;

use async_trait::async_trait;
use serde_json::Value;

use crate::stats::PullStats;
use shopfetch_common::Result;

pub use classify::{classify_rejection, BLOCKED_MARKER, THROTTLED_MARKER};
pub use puller::BulkPuller;

/// Destination for parsed bulk result records.
///
/// `route` receives one decoded record per non-empty result line, in file
/// order. `finish` is called exactly once after the last record and must
/// flush any buffered writes.
#[async_trait]
pub trait RecordRouter: Send {
    async fn route(&mut self, record: Value, stats: &mut PullStats) -> Result<()>;

    async fn finish(&mut self, stats: &mut PullStats) -> Result<()>;
}
