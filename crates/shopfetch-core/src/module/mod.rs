//! Pluggable extraction modules
//!
//! Each module owns its staging tables and knows how to fill them from the
//! remote API and how to read them back during reassembly. Modules are
//! independent: a run manager can combine any subset, with exactly one
//! (products) driving the outer iteration and the rest enriching.
//!
//! Shared behavior (table bootstrapping, row queries, batched writes) lives
//! in the staging store and is composed by delegation; modules implement
//! only API-specific shaping.

pub mod collections;
pub mod inventory;
pub mod metafields;
pub mod products;
pub mod registry;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::Transport;
use crate::config::PullConfig;
use crate::entity::{Product, Variant};
use crate::reassembly::ProductCursor;
use crate::session::Session;
use crate::staging::StagingStore;
use crate::stats::PullStats;
use shopfetch_common::{PullError, Result};

pub use collections::CollectionsModule;
pub use inventory::InventoryModule;
pub use metafields::MetafieldsModule;
pub use products::ProductsModule;
pub use registry::ModuleRegistry;

/// Everything a module needs while populating its staging tables.
pub struct PullContext<'a> {
    pub store: &'a StagingStore,
    pub transport: &'a dyn Transport,
    pub config: &'a PullConfig,
    pub session: &'a Session,
}

/// Capability set every extraction module implements.
#[async_trait]
pub trait CatalogModule: Send + Sync {
    /// Stable key used for staging-table prefixes and log fields.
    fn name(&self) -> &'static str;

    /// Output columns this module contributes, computed once from the
    /// session's options at construction time.
    fn output_fields(&self) -> &[String];

    /// Populate this module's staging tables from the remote API. Invoked
    /// exactly once per run; any error aborts the run.
    async fn run(&self, ctx: &PullContext<'_>, stats: &mut PullStats) -> Result<()>;

    /// Open the reassembly cursor. Only meaningful for the primary module;
    /// everything else keeps the default rejection.
    fn products<'a>(&self, store: &'a StagingStore) -> Result<ProductCursor<'a>> {
        let _ = store;
        Err(PullError::Validation(format!(
            "Module {} cannot drive reassembly",
            self.name()
        )))
    }

    /// Merge any staged payload for this product into it, in place. No-op
    /// when nothing is staged or the module's concern does not apply.
    async fn enrich_product(&self, store: &StagingStore, product: &mut Product) -> Result<()> {
        let _ = (store, product);
        Ok(())
    }

    /// Variant counterpart of [`CatalogModule::enrich_product`].
    async fn enrich_variant(&self, store: &StagingStore, variant: &mut Variant) -> Result<()> {
        let _ = (store, variant);
        Ok(())
    }
}

/// Extract the numeric id from either representation the API uses: a plain
/// integer (REST) or a globally-namespaced `gid://…/Type/123` string
/// (GraphQL/bulk). Only strictly positive ids are valid staging keys.
pub fn parse_global_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => {
            let tail = s.rsplit('/').next()?;
            // Bulk result gids may carry a query string, e.g. .../123?index=0
            tail.split('?').next()?.parse().ok()?
        }
        _ => return None,
    };
    (id > 0).then_some(id)
}
