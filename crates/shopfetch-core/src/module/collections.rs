//! Collections module
//!
//! One bulk query lists collections with their member products. Membership
//! children repeat product ids across collections, so they cannot be staged
//! keyed by product id; instead memberships are accumulated per collection
//! during parsing (linkage from the explicit parent reference, never from
//! record order) and flushed as one row per collection with the member ids
//! embedded. Product enrichment goes through a lazily-built product → handle
//! index, scanned once per run.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::OnceCell;

use crate::bulk::{BulkPuller, RecordRouter};
use crate::entity::Product;
use crate::module::{parse_global_id, CatalogModule, PullContext};
use crate::staging::{BatchInserter, StagedRow, StagingStore};
use crate::stats::PullStats;
use shopfetch_common::{PullError, Result};

const ITEMS_KIND: &str = "items";

const BULK_QUERY: &str = r#"{
  collections {
    edges {
      node {
        id
        handle
        title
        products {
          edges { node { id } }
        }
      }
    }
  }
}"#;

pub struct CollectionsModule {
    fields: Vec<String>,
    /// Product id → joined collection handles, built on first enrichment.
    index: OnceCell<HashMap<i64, String>>,
}

impl CollectionsModule {
    pub fn new() -> Self {
        Self {
            fields: vec!["collections".to_string()],
            index: OnceCell::new(),
        }
    }

    async fn build_index(&self, store: &StagingStore) -> Result<HashMap<i64, String>> {
        let table = store.table(self.name(), ITEMS_KIND)?;
        let mut handles_by_product: HashMap<i64, Vec<String>> = HashMap::new();

        // Ordered scan so each product's handle list follows collection id
        // order deterministically.
        let mut after = 0;
        while let Some(row) = store.next_after(&table, after).await? {
            after = row.id;
            if row.is_gap() {
                continue;
            }
            let payload: Value = serde_json::from_str(&row.data).map_err(|e| {
                PullError::Infrastructure(format!(
                    "Corrupt staged collection payload for id {}: {}",
                    row.id, e
                ))
            })?;

            let Some(handle) = payload.get("handle").and_then(Value::as_str) else {
                continue;
            };
            let members = payload
                .get("product_ids")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for member in members {
                if let Some(product_id) = member.as_i64() {
                    handles_by_product
                        .entry(product_id)
                        .or_default()
                        .push(handle.to_string());
                }
            }
        }

        Ok(handles_by_product
            .into_iter()
            .map(|(product_id, handles)| (product_id, handles.join(", ")))
            .collect())
    }
}

impl Default for CollectionsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogModule for CollectionsModule {
    fn name(&self) -> &'static str {
        "collections"
    }

    fn output_fields(&self) -> &[String] {
        &self.fields
    }

    async fn run(&self, ctx: &PullContext<'_>, stats: &mut PullStats) -> Result<()> {
        let table = ctx.store.table(self.name(), ITEMS_KIND)?;
        ctx.store.create_table(&table).await?;

        let mut router = CollectionRouter {
            inserter: BatchInserter::from_config(ctx.store, table, ctx.config),
            collections: BTreeMap::new(),
        };

        let puller = BulkPuller::new(ctx.transport, ctx.config);
        puller.pull(BULK_QUERY, &mut router, stats).await?;

        tracing::info!("Collections module staged");
        Ok(())
    }

    async fn enrich_product(&self, store: &StagingStore, product: &mut Product) -> Result<()> {
        let index = self
            .index
            .get_or_try_init(|| self.build_index(store))
            .await?;

        if let Some(handles) = index.get(&product.id()) {
            product.add_datum("collections", json!(handles));
        }
        Ok(())
    }
}

#[derive(Default)]
struct PendingCollection {
    handle: Option<String>,
    title: Option<String>,
    product_ids: Vec<i64>,
}

/// Accumulates collection metadata and memberships across the whole result
/// stream, then flushes one row per collection on finish.
struct CollectionRouter<'a> {
    inserter: BatchInserter<'a>,
    collections: BTreeMap<i64, PendingCollection>,
}

#[async_trait]
impl RecordRouter for CollectionRouter<'_> {
    async fn route(&mut self, record: Value, stats: &mut PullStats) -> Result<()> {
        match record.get("__parentId") {
            // Membership child: product id under its collection.
            Some(parent) => {
                let (Some(product_id), Some(collection_id)) = (
                    record.get("id").and_then(parse_global_id),
                    parse_global_id(parent),
                ) else {
                    stats.inc_warning();
                    tracing::warn!("Collection membership without usable ids, skipping");
                    return Ok(());
                };
                self.collections
                    .entry(collection_id)
                    .or_default()
                    .product_ids
                    .push(product_id);
            }
            // Collection record itself.
            None => {
                let Some(id) = record.get("id").and_then(parse_global_id) else {
                    stats.inc_warning();
                    tracing::warn!("Collection record without usable id, skipping");
                    return Ok(());
                };
                let entry = self.collections.entry(id).or_default();
                entry.handle = record
                    .get("handle")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                entry.title = record
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
        }
        Ok(())
    }

    async fn finish(&mut self, stats: &mut PullStats) -> Result<()> {
        for (id, pending) in std::mem::take(&mut self.collections) {
            if pending.handle.is_none() {
                // Memberships arrived for a collection whose own record
                // never did; nothing usable to enrich with.
                stats.inc_warning();
                tracing::warn!(collection_id = id, "Memberships without collection record");
                continue;
            }
            let data = json!({
                "handle": pending.handle,
                "title": pending.title,
                "product_ids": pending.product_ids,
            });
            self.inserter
                .push(StagedRow::new(id, None, data.to_string()))
                .await?;
        }
        self.inserter.flush().await?;
        Ok(())
    }
}
