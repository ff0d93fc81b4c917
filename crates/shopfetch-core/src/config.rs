//! Pull pipeline configuration

use shopfetch_common::{PullError, Result};

// ============================================================================
// Pull Configuration Constants
// ============================================================================

/// Default Admin API version requested from the remote platform.
pub const DEFAULT_API_VERSION: &str = "2024-07";

/// Default timeout for individual HTTP requests, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default interval between bulk job status polls, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default backoff before re-submitting after a "query already running"
/// rejection, in milliseconds.
pub const DEFAULT_BLOCKED_BACKOFF_MS: u64 = 5_000;

/// Default backoff before re-submitting after a throttled rejection, in
/// milliseconds. Deliberately longer than the blocked backoff.
pub const DEFAULT_THROTTLED_BACKOFF_MS: u64 = 20_000;

/// Default bound on consecutive bulk conflict retries before giving up.
pub const DEFAULT_MAX_BULK_ATTEMPTS: u32 = 5;

/// Default maximum rows buffered before a staged batch insert flushes.
pub const DEFAULT_BATCH_MAX_ROWS: usize = 200;

/// Default maximum buffered payload bytes before a staged batch insert
/// flushes, whichever limit triggers first.
pub const DEFAULT_BATCH_MAX_BYTES: usize = 512 * 1024;

/// Default page size for paginated REST pulls.
pub const DEFAULT_REST_PAGE_SIZE: u32 = 250;

/// Default attempts for downloading a completed bulk result.
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Tunable knobs for one pull run.
///
/// Immutable after construction; every component borrows it read-only.
#[derive(Debug, Clone)]
pub struct PullConfig {
    pub api_version: String,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub blocked_backoff_ms: u64,
    pub throttled_backoff_ms: u64,
    pub max_bulk_attempts: u32,
    pub batch_max_rows: usize,
    pub batch_max_bytes: usize,
    pub rest_page_size: u32,
    pub download_attempts: u32,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            blocked_backoff_ms: DEFAULT_BLOCKED_BACKOFF_MS,
            throttled_backoff_ms: DEFAULT_THROTTLED_BACKOFF_MS,
            max_bulk_attempts: DEFAULT_MAX_BULK_ATTEMPTS,
            batch_max_rows: DEFAULT_BATCH_MAX_ROWS,
            batch_max_bytes: DEFAULT_BATCH_MAX_BYTES,
            rest_page_size: DEFAULT_REST_PAGE_SIZE,
            download_attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
        }
    }
}

impl PullConfig {
    /// Load configuration from `PULL_*` environment variables, falling back
    /// to the defaults above.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(version) = std::env::var("PULL_API_VERSION") {
            config.api_version = version;
        }
        config.request_timeout_secs =
            env_parse("PULL_REQUEST_TIMEOUT_SECS", config.request_timeout_secs);
        config.poll_interval_ms = env_parse("PULL_POLL_INTERVAL_MS", config.poll_interval_ms);
        config.blocked_backoff_ms =
            env_parse("PULL_BLOCKED_BACKOFF_MS", config.blocked_backoff_ms);
        config.throttled_backoff_ms =
            env_parse("PULL_THROTTLED_BACKOFF_MS", config.throttled_backoff_ms);
        config.max_bulk_attempts = env_parse("PULL_MAX_BULK_ATTEMPTS", config.max_bulk_attempts);
        config.batch_max_rows = env_parse("PULL_BATCH_MAX_ROWS", config.batch_max_rows);
        config.batch_max_bytes = env_parse("PULL_BATCH_MAX_BYTES", config.batch_max_bytes);
        config.rest_page_size = env_parse("PULL_REST_PAGE_SIZE", config.rest_page_size);
        config.download_attempts = env_parse("PULL_DOWNLOAD_ATTEMPTS", config.download_attempts);

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.api_version.is_empty() {
            return Err(PullError::Validation("API version cannot be empty".into()));
        }
        if self.max_bulk_attempts == 0 {
            return Err(PullError::Validation(
                "max_bulk_attempts must be at least 1".into(),
            ));
        }
        if self.batch_max_rows == 0 || self.batch_max_bytes == 0 {
            return Err(PullError::Validation(
                "batch limits must be greater than 0".into(),
            ));
        }
        if self.rest_page_size == 0 {
            return Err(PullError::Validation(
                "rest_page_size must be greater than 0".into(),
            ));
        }
        if self.download_attempts == 0 {
            return Err(PullError::Validation(
                "download_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
