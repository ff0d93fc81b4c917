//! Run manager
//!
//! Owns one pull run end to end: builds the registry from the session, runs
//! every enabled module sequentially against run-scoped staging tables, and
//! hands the caller the reassembly stream plus the final statistics. There
//! is exactly one writer per staging table and reads only start after the
//! owning module's run has completed, so no locking is needed inside a run;
//! parallelism across pull requests comes from per-run table prefixes and
//! process isolation, supervised outside this crate.

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::api::Transport;
use crate::config::PullConfig;
use crate::module::{ModuleRegistry, PullContext};
use crate::reassembly::ReassemblyStream;
use crate::session::Session;
use crate::staging::StagingStore;
use crate::stats::PullStats;
use shopfetch_common::Result;

pub struct PullRunner {
    session: Session,
    config: PullConfig,
    store: StagingStore,
    transport: Arc<dyn Transport>,
    registry: ModuleRegistry,
}

impl PullRunner {
    pub fn new(
        session: Session,
        config: PullConfig,
        pool: SqlitePool,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let store = StagingStore::new(pool, session.staging_prefix())?;
        let registry = ModuleRegistry::from_session(&session)?;

        Ok(Self {
            session,
            config,
            store,
            transport,
            registry,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &StagingStore {
        &self.store
    }

    /// Composed output columns across all enabled modules.
    pub fn output_fields(&self) -> Vec<String> {
        self.registry.output_fields()
    }

    /// Run every enabled module in registration order. Each module's `run`
    /// is invoked exactly once; the first failure aborts the run.
    pub async fn run_modules(&self, stats: &mut PullStats) -> Result<()> {
        for module in self.registry.modules() {
            tracing::info!(module = module.name(), "Running extraction module");

            let ctx = PullContext {
                store: &self.store,
                transport: self.transport.as_ref(),
                config: &self.config,
                session: &self.session,
            };

            module.run(&ctx, stats).await.map_err(|e| {
                tracing::error!(module = module.name(), error = %e, "Extraction module failed");
                e
            })?;

            tracing::info!(module = module.name(), stats = %stats, "Extraction module finished");
        }
        Ok(())
    }

    /// Open the reassembly stream. Valid only after [`Self::run_modules`]
    /// has completed; the staging tables are read-only from here on.
    pub fn stream(&self) -> Result<ReassemblyStream<'_>> {
        let cursor = self.registry.primary().products(&self.store)?;
        Ok(ReassemblyStream::new(
            cursor,
            &self.store,
            self.registry.enrichers(),
        ))
    }

    /// Drop this run's staging tables. Explicit teardown only; failed runs
    /// leave their tables for external cleanup.
    pub async fn teardown(&self) -> Result<()> {
        self.store.teardown().await
    }
}
