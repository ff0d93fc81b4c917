//! Shared harness for pipeline integration tests
//!
//! Provides an in-memory staging pool and a scripted transport that feeds
//! canned bulk results and REST pages to the pipeline in module order, so
//! tests exercise the real puller, staging store and reassembly stream
//! without a network.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::Mutex;

use shopfetch_common::Result;
use shopfetch_core::api::types::{
    ApiUserError, BulkJobRef, BulkJobStatus, BulkSubmission, Page,
};
use shopfetch_core::api::Transport;

/// One in-memory staging database. A single connection keeps every query on
/// the same memory instance.
pub async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory staging database")
}

/// Transport stub: bulk results are popped in submission order, REST pages
/// in request order. Rejections can be queued ahead of acceptance to
/// exercise the conflict retry path.
#[derive(Default)]
pub struct ScriptedTransport {
    bulk_results: Mutex<VecDeque<String>>,
    rejections: Mutex<VecDeque<Vec<ApiUserError>>>,
    rest_pages: Mutex<VecDeque<(Value, Option<String>)>>,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one newline-delimited bulk result body.
    pub fn push_bulk_result(&self, jsonl: &str) {
        self.bulk_results
            .lock()
            .unwrap()
            .push_back(jsonl.to_string());
    }

    /// Queue a rejection for the next submission.
    pub fn push_rejection(&self, messages: &[&str]) {
        self.rejections
            .lock()
            .unwrap()
            .push_back(messages.iter().map(|m| ApiUserError::new(*m)).collect());
    }

    /// Queue one REST page.
    pub fn push_rest_page(&self, body: Value, next_page: Option<&str>) {
        self.rest_pages
            .lock()
            .unwrap()
            .push_back((body, next_page.map(str::to_string)));
    }

    /// Bulk queries submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit_bulk_query(&self, query: &str) -> Result<BulkSubmission> {
        if let Some(errors) = self.rejections.lock().unwrap().pop_front() {
            return Ok(BulkSubmission::Rejected(errors));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(query.to_string());
        Ok(BulkSubmission::Accepted(BulkJobRef {
            id: format!("gid://shopify/BulkOperation/{}", submitted.len()),
        }))
    }

    async fn poll_bulk_job(&self, _job: &BulkJobRef) -> Result<BulkJobStatus> {
        Ok(BulkJobStatus::Completed {
            url: Some("scripted://bulk-result".to_string()),
            object_count: None,
        })
    }

    async fn download_bulk_result(&self, _url: &str) -> Result<Vec<u8>> {
        let body = self
            .bulk_results
            .lock()
            .unwrap()
            .pop_front()
            .expect("No scripted bulk result queued");
        Ok(body.into_bytes())
    }

    async fn request(
        &self,
        _method: &str,
        _path: &str,
        _params: &[(String, String)],
    ) -> Result<Page> {
        let (body, next_page) = self
            .rest_pages
            .lock()
            .unwrap()
            .pop_front()
            .expect("No scripted REST page queued");
        Ok(Page { body, next_page })
    }
}
