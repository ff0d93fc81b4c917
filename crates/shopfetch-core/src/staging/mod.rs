//! Run-scoped relational staging area
//!
//! Every module owns one or more staging tables inside a shared SQLite
//! database. Tables are namespaced by the run's prefix so parallel pull
//! requests (separate OS processes) never collide, created fresh per run,
//! and dropped only on explicit teardown.

pub mod batch;
pub mod store;

pub use batch::BatchInserter;
pub use store::{StagedRow, StagingStore, StagingTable};
