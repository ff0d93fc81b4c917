//! Inventory module
//!
//! The bulk API does not expose per-variant inventory in the shape the
//! export needs, so this module walks the paginated REST variants endpoint
//! instead, staging one row per variant id. It enriches variants only; a
//! bare product carries no inventory concern.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::entity::Variant;
use crate::module::{parse_global_id, CatalogModule, PullContext};
use crate::staging::{BatchInserter, StagedRow, StagingStore};
use crate::stats::PullStats;
use shopfetch_common::Result;

const LEVELS_KIND: &str = "levels";

/// REST path listing variants with their inventory fields.
const VARIANTS_PATH: &str = "variants";

pub struct InventoryModule {
    fields: Vec<String>,
}

impl InventoryModule {
    pub fn new() -> Self {
        Self {
            fields: [
                "variant_inventory_qty",
                "variant_inventory_policy",
                "variant_inventory_tracked",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }

    fn shape_level(item: &Value) -> Option<Value> {
        let mut fields = Map::new();
        fields.insert(
            "variant_inventory_qty".into(),
            json!(item.get("inventory_quantity").and_then(Value::as_i64).unwrap_or(0)),
        );
        if let Some(policy) = item.get("inventory_policy").and_then(Value::as_str) {
            fields.insert("variant_inventory_policy".into(), json!(policy));
        }
        let tracked = item
            .get("inventory_management")
            .map(|v| !v.is_null())
            .unwrap_or(false);
        fields.insert("variant_inventory_tracked".into(), json!(tracked));
        Some(Value::Object(fields))
    }
}

impl Default for InventoryModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogModule for InventoryModule {
    fn name(&self) -> &'static str {
        "inventory"
    }

    fn output_fields(&self) -> &[String] {
        &self.fields
    }

    async fn run(&self, ctx: &PullContext<'_>, stats: &mut PullStats) -> Result<()> {
        let table = ctx.store.table(self.name(), LEVELS_KIND)?;
        ctx.store.create_table(&table).await?;

        let mut inserter = BatchInserter::from_config(ctx.store, table, ctx.config);
        let mut cursor: Option<String> = None;

        loop {
            let mut params = vec![
                ("limit".to_string(), ctx.config.rest_page_size.to_string()),
                (
                    "fields".to_string(),
                    "id,inventory_quantity,inventory_policy,inventory_management".to_string(),
                ),
            ];
            if let Some(ref page_info) = cursor {
                params.push(("page_info".to_string(), page_info.clone()));
            }

            let page = ctx.transport.request("GET", VARIANTS_PATH, &params).await?;
            stats.inc_page();

            let items = page
                .body
                .get("variants")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            for item in &items {
                let Some(id) = item.get("id").and_then(parse_global_id) else {
                    stats.inc_warning();
                    tracing::warn!("Inventory item without usable variant id, skipping");
                    continue;
                };
                if let Some(data) = Self::shape_level(item) {
                    inserter.push(StagedRow::new(id, None, data.to_string())).await?;
                }
            }

            tracing::debug!(
                page = stats.pages,
                items = items.len(),
                "Inventory page staged"
            );

            match page.next_page {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let staged = inserter.close().await?;
        tracing::info!(staged, pages = stats.pages, "Inventory module staged");
        Ok(())
    }

    async fn enrich_variant(&self, store: &StagingStore, variant: &mut Variant) -> Result<()> {
        let table = store.table(self.name(), LEVELS_KIND)?;
        let Some(row) = store.find_by_id(&table, variant.id()).await? else {
            return Ok(());
        };
        if row.is_gap() {
            return Ok(());
        }

        let payload: Value = serde_json::from_str(&row.data).map_err(|e| {
            shopfetch_common::PullError::Infrastructure(format!(
                "Corrupt staged inventory payload for variant {}: {}",
                variant.id(),
                e
            ))
        })?;
        variant.add_data(&payload);
        Ok(())
    }
}
