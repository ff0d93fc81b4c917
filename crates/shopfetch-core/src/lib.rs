//! Bulk catalog extraction and staged reassembly
//!
//! Pulls catalog data (products, variants, inventory, metafields,
//! collections) out of a Shopify-compatible Admin API and rebuilds it as an
//! ordered stream of denormalized products for export.
//!
//! # Architecture
//!
//! - **api**: the transport contract and the reqwest Admin API client
//! - **bulk**: the asynchronous bulk query lifecycle (submit, classify
//!   conflicts, poll, download, parse)
//! - **staging**: run-scoped SQLite staging tables with batched inserts
//! - **module**: pluggable extraction units and their registry
//! - **reassembly**: the watermark-driven cursor and enrichment stream
//! - **runner**: one pull run end to end
//!
//! # Example
//!
//! ```no_run
//! use shopfetch_core::{
//!     config::PullConfig,
//!     runner::PullRunner,
//!     session::{DataType, ExportOptions, Session},
//!     stats::PullStats,
//!     api::AdminClient,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> shopfetch_common::Result<()> {
//! let config = PullConfig::default();
//! let session = Session::new(
//!     "example.myshopify.com",
//!     "token",
//!     "run1",
//!     vec![DataType::Products, DataType::Metafields],
//!     ExportOptions::default(),
//! )?;
//! let pool = sqlx::SqlitePool::connect("sqlite://staging.db").await?;
//! let transport = Arc::new(AdminClient::new(&session, &config)?);
//!
//! let runner = PullRunner::new(session, config, pool, transport)?;
//! let mut stats = PullStats::new();
//! runner.run_modules(&mut stats).await?;
//!
//! let mut stream = runner.stream()?;
//! while let Some(product) = stream.next().await? {
//!     println!("{} ({} variants)", product.id(), product.variants.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod bulk;
pub mod config;
pub mod entity;
pub mod module;
pub mod reassembly;
pub mod runner;
pub mod session;
pub mod staging;
pub mod stats;

pub use config::PullConfig;
pub use entity::{Product, Variant};
pub use runner::PullRunner;
pub use session::{DataType, ExportOptions, Session};
pub use stats::PullStats;
