//! Shared building blocks for the shopfetch workspace
//!
//! - **error**: the pull pipeline error taxonomy and the process-boundary
//!   error envelope
//! - **logging**: tracing subscriber bootstrap driven by `LOG_*` environment
//!   variables

pub mod error;
pub mod logging;

pub use error::{BulkConflictKind, ErrorEnvelope, PullError, Result};
