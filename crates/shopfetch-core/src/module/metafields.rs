//! Metafields module
//!
//! One bulk query covers metafields on products and on their variants. Each
//! metafield arrives as its own record carrying an explicit parent
//! reference; the owner's type decides which of the two staging tables the
//! row lands in. Rows are keyed by the metafield's own id with the owner id
//! as parent, so enrichment is a parent-id lookup.

use async_trait::async_trait;
use serde_json::Value;

use crate::bulk::{BulkPuller, RecordRouter};
use crate::entity::{Product, Variant};
use crate::module::{parse_global_id, CatalogModule, PullContext};
use crate::session::Session;
use crate::staging::{BatchInserter, StagedRow, StagingStore, StagingTable};
use crate::stats::PullStats;
use shopfetch_common::{PullError, Result};

const PRODUCT_KIND: &str = "products";
const VARIANT_KIND: &str = "variants";

const BULK_QUERY: &str = r#"{
  products {
    edges {
      node {
        id
        metafields {
          edges { node { id namespace key value type } }
        }
        variants {
          edges {
            node {
              id
              metafields {
                edges { node { id namespace key value type } }
              }
            }
          }
        }
      }
    }
  }
}"#;

pub struct MetafieldsModule {
    fields: Vec<String>,
}

impl MetafieldsModule {
    pub fn new(session: &Session) -> Self {
        // One product-level and one variant-level column per configured key.
        let mut fields = Vec::new();
        for key in &session.options().metafield_keys {
            fields.push(format!("metafield.{}", key));
            fields.push(format!("variant_metafield.{}", key));
        }
        Self { fields }
    }

    async fn enrich_from(
        &self,
        store: &StagingStore,
        table: &StagingTable,
        owner_id: i64,
        prefix: &str,
        mut insert: impl FnMut(String, Value),
    ) -> Result<()> {
        for row in store.find_by_parent(table, owner_id).await? {
            if row.is_gap() {
                continue;
            }
            let payload: Value = serde_json::from_str(&row.data).map_err(|e| {
                PullError::Infrastructure(format!(
                    "Corrupt staged metafield payload for owner {}: {}",
                    owner_id, e
                ))
            })?;

            let (Some(namespace), Some(key)) = (
                payload.get("namespace").and_then(Value::as_str),
                payload.get("key").and_then(Value::as_str),
            ) else {
                continue;
            };
            let value = payload.get("value").cloned().unwrap_or(Value::Null);
            insert(format!("{}.{}.{}", prefix, namespace, key), value);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogModule for MetafieldsModule {
    fn name(&self) -> &'static str {
        "metafields"
    }

    fn output_fields(&self) -> &[String] {
        &self.fields
    }

    async fn run(&self, ctx: &PullContext<'_>, stats: &mut PullStats) -> Result<()> {
        let products = ctx.store.table(self.name(), PRODUCT_KIND)?;
        let variants = ctx.store.table(self.name(), VARIANT_KIND)?;
        ctx.store.create_table(&products).await?;
        ctx.store.create_table(&variants).await?;

        let mut router = MetafieldRouter {
            products: BatchInserter::from_config(ctx.store, products, ctx.config),
            variants: BatchInserter::from_config(ctx.store, variants, ctx.config),
        };

        let puller = BulkPuller::new(ctx.transport, ctx.config);
        puller.pull(BULK_QUERY, &mut router, stats).await?;

        tracing::info!("Metafields module staged");
        Ok(())
    }

    async fn enrich_product(&self, store: &StagingStore, product: &mut Product) -> Result<()> {
        let table = store.table(self.name(), PRODUCT_KIND)?;
        let id = product.id();
        let mut staged = Vec::new();
        self.enrich_from(store, &table, id, "metafield", |key, value| {
            staged.push((key, value));
        })
        .await?;
        for (key, value) in staged {
            product.add_datum(key, value);
        }
        Ok(())
    }

    async fn enrich_variant(&self, store: &StagingStore, variant: &mut Variant) -> Result<()> {
        let table = store.table(self.name(), VARIANT_KIND)?;
        let id = variant.id();
        let mut staged = Vec::new();
        self.enrich_from(store, &table, id, "variant_metafield", |key, value| {
            staged.push((key, value));
        })
        .await?;
        for (key, value) in staged {
            variant.add_datum(key, value);
        }
        Ok(())
    }
}

/// Routes metafield records by owner type; product and variant skeleton
/// records in the same result stream are ignored.
struct MetafieldRouter<'a> {
    products: BatchInserter<'a>,
    variants: BatchInserter<'a>,
}

#[async_trait]
impl RecordRouter for MetafieldRouter<'_> {
    async fn route(&mut self, record: Value, stats: &mut PullStats) -> Result<()> {
        // Only metafield records matter here; the bulk stream interleaves
        // the owning product/variant skeletons as well.
        if record.get("namespace").is_none() || record.get("key").is_none() {
            return Ok(());
        }

        let Some(parent) = record.get("__parentId").and_then(Value::as_str) else {
            stats.inc_warning();
            tracing::warn!("Metafield record without parent reference, skipping");
            return Ok(());
        };
        let (Some(id), Some(owner_id)) = (
            record.get("id").and_then(parse_global_id),
            parse_global_id(&Value::String(parent.to_string())),
        ) else {
            stats.inc_warning();
            tracing::warn!("Metafield record without usable ids, skipping");
            return Ok(());
        };

        let row = StagedRow::new(id, Some(owner_id), record.to_string());
        if parent.contains("/ProductVariant/") {
            self.variants.push(row).await?;
        } else if parent.contains("/Product/") {
            self.products.push(row).await?;
        } else {
            stats.inc_warning();
            tracing::warn!(parent = %parent, "Metafield with unknown owner type, skipping");
        }
        Ok(())
    }

    async fn finish(&mut self, _stats: &mut PullStats) -> Result<()> {
        self.products.flush().await?;
        self.variants.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DataType, ExportOptions};

    #[test]
    fn test_output_fields_follow_configured_keys() {
        let session = Session::new(
            "example.myshopify.com",
            "token",
            "t1",
            vec![DataType::Products, DataType::Metafields],
            ExportOptions {
                metafield_keys: vec!["custom.material".to_string()],
                ..Default::default()
            },
        )
        .unwrap();

        let module = MetafieldsModule::new(&session);
        assert_eq!(
            module.output_fields(),
            &[
                "metafield.custom.material".to_string(),
                "variant_metafield.custom.material".to_string(),
            ]
        );
    }

    #[test]
    fn test_no_keys_no_columns() {
        let session = Session::new(
            "example.myshopify.com",
            "token",
            "t1",
            vec![DataType::Products, DataType::Metafields],
            ExportOptions::default(),
        )
        .unwrap();
        assert!(MetafieldsModule::new(&session).output_fields().is_empty());
    }
}
