//! Staged reassembly
//!
//! Turns staged rows back into an ordered, lazily-produced sequence of
//! products with nested variants. The cursor is watermark-driven: each step
//! reads the first primary-table row with id strictly greater than the last
//! retrieved id, so a fresh cursor started from a stored watermark resumes
//! without re-emitting anything at or below it. Single pass, not
//! restartable in place.

use serde_json::Value;

use crate::entity::{Product, Variant};
use crate::module::CatalogModule;
use crate::staging::{StagingStore, StagingTable};
use shopfetch_common::{PullError, Result};

/// Watermark-driven reader over a products table and its variants table.
pub struct ProductCursor<'a> {
    store: &'a StagingStore,
    products: StagingTable,
    variants: StagingTable,
    watermark: i64,
    done: bool,
}

impl<'a> ProductCursor<'a> {
    pub fn new(store: &'a StagingStore, products: StagingTable, variants: StagingTable) -> Self {
        Self {
            store,
            products,
            variants,
            watermark: 0,
            done: false,
        }
    }

    /// Resume from a stored watermark instead of the beginning.
    pub fn with_watermark(mut self, watermark: i64) -> Self {
        self.watermark = watermark;
        self
    }

    /// Last retrieved id. Rows with empty payload advance this without
    /// producing an emission.
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Produce the next product, or `None` at end-of-data. Terminates
    /// defensively at the first row whose id is not positive.
    pub async fn next(&mut self) -> Result<Option<Product>> {
        if self.done {
            return Ok(None);
        }

        loop {
            let Some(row) = self.store.next_after(&self.products, self.watermark).await? else {
                self.done = true;
                return Ok(None);
            };

            if row.id <= 0 {
                self.done = true;
                return Ok(None);
            }

            self.watermark = row.id;

            if row.is_gap() {
                continue;
            }

            let payload = decode_payload(&row.data, row.id)?;
            let mut product = Product::new(row.id);
            product.add_data(&payload);

            for variant_row in self.store.find_by_parent(&self.variants, row.id).await? {
                if variant_row.is_gap() {
                    continue;
                }
                let variant_payload = decode_payload(&variant_row.data, variant_row.id)?;
                let mut variant = Variant::new(variant_row.id, row.id);
                variant.add_data(&variant_payload);
                product.variants.push(variant);
            }

            return Ok(Some(product));
        }
    }
}

fn decode_payload(data: &str, id: i64) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| {
        PullError::Infrastructure(format!("Corrupt staged payload for id {}: {}", id, e))
    })
}

/// The full reassembly stream: the primary module's cursor plus every other
/// enabled module applied as an enricher, in registration order. Later
/// modules win on conflicting fields.
pub struct ReassemblyStream<'a> {
    cursor: ProductCursor<'a>,
    store: &'a StagingStore,
    enrichers: Vec<&'a dyn CatalogModule>,
}

impl<'a> ReassemblyStream<'a> {
    pub fn new(
        cursor: ProductCursor<'a>,
        store: &'a StagingStore,
        enrichers: Vec<&'a dyn CatalogModule>,
    ) -> Self {
        Self {
            cursor,
            store,
            enrichers,
        }
    }

    pub fn watermark(&self) -> i64 {
        self.cursor.watermark()
    }

    pub async fn next(&mut self) -> Result<Option<Product>> {
        let Some(mut product) = self.cursor.next().await? else {
            return Ok(None);
        };

        for module in &self.enrichers {
            module.enrich_product(self.store, &mut product).await?;
            for variant in product.variants.iter_mut() {
                module.enrich_variant(self.store, variant).await?;
            }
        }

        Ok(Some(product))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::PullContext;
    use crate::staging::StagedRow;
    use crate::stats::PullStats;
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_store() -> (StagingStore, StagingTable, StagingTable) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = StagingStore::new(pool, "run_test").unwrap();
        let products = store.table("products", "items").unwrap();
        let variants = store.table("products", "variants").unwrap();
        store.create_table(&products).await.unwrap();
        store.create_table(&variants).await.unwrap();
        (store, products, variants)
    }

    async fn seed(store: &StagingStore, table: &StagingTable, rows: &[StagedRow]) {
        store.insert_rows(table, rows).await.unwrap();
    }

    #[tokio::test]
    async fn test_emits_strictly_increasing_ids_and_terminates() {
        let (store, products, variants) = seeded_store().await;
        seed(
            &store,
            &products,
            &[
                StagedRow::new(30, None, r#"{"title":"c"}"#),
                StagedRow::new(10, None, r#"{"title":"a"}"#),
                StagedRow::new(20, None, r#"{"title":"b"}"#),
            ],
        )
        .await;

        let mut cursor = ProductCursor::new(&store, products, variants);
        let mut ids = Vec::new();
        while let Some(product) = cursor.next().await.unwrap() {
            ids.push(product.id());
        }
        assert_eq!(ids, vec![10, 20, 30]);
        assert!(cursor.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_gap_rows_advance_watermark_without_emission() {
        let (store, products, variants) = seeded_store().await;
        seed(
            &store,
            &products,
            &[
                StagedRow::gap(10),
                StagedRow::new(20, None, r#"{"title":"b"}"#),
                StagedRow::gap(30),
            ],
        )
        .await;

        let mut cursor = ProductCursor::new(&store, products, variants);

        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.id(), 20);
        assert_eq!(cursor.watermark(), 20);

        // The trailing gap is consumed while looking for the next product.
        assert!(cursor.next().await.unwrap().is_none());
        assert_eq!(cursor.watermark(), 30);
    }

    #[tokio::test]
    async fn test_restart_from_watermark_never_re_emits() {
        let (store, products, variants) = seeded_store().await;
        seed(
            &store,
            &products,
            &[
                StagedRow::new(10, None, r#"{"title":"a"}"#),
                StagedRow::new(20, None, r#"{"title":"b"}"#),
                StagedRow::new(30, None, r#"{"title":"c"}"#),
            ],
        )
        .await;

        let mut cursor =
            ProductCursor::new(&store, products, variants).with_watermark(10);
        let mut ids = Vec::new();
        while let Some(product) = cursor.next().await.unwrap() {
            ids.push(product.id());
        }
        assert_eq!(ids, vec![20, 30]);
    }

    #[tokio::test]
    async fn test_variants_loaded_by_parent_and_gaps_skipped() {
        let (store, products, variants) = seeded_store().await;
        seed(
            &store,
            &products,
            &[StagedRow::new(10, None, r#"{"title":"a"}"#)],
        )
        .await;
        seed(
            &store,
            &variants,
            &[
                StagedRow::new(101, Some(10), r#"{"variant_sku":"A-1"}"#),
                StagedRow::new(102, Some(10), ""),
                StagedRow::new(201, Some(20), r#"{"variant_sku":"B-1"}"#),
            ],
        )
        .await;

        let mut cursor = ProductCursor::new(&store, products, variants);
        let product = cursor.next().await.unwrap().unwrap();
        assert_eq!(product.variants.len(), 1);
        assert_eq!(product.variants[0].id(), 101);
        assert_eq!(product.variants[0].parent_id(), 10);
    }

    #[tokio::test]
    async fn test_non_positive_id_terminates_defensively() {
        let (store, products, variants) = seeded_store().await;
        seed(
            &store,
            &products,
            &[
                StagedRow::new(-5, None, r#"{"title":"bad"}"#),
                StagedRow::new(10, None, r#"{"title":"a"}"#),
            ],
        )
        .await;

        // Starting below the negative row, the cursor stops at it.
        let mut cursor =
            ProductCursor::new(&store, products, variants).with_watermark(-10);
        assert!(cursor.next().await.unwrap().is_none());
    }

    /// Enricher stub that stamps a fixed field value on every entity.
    struct StampModule {
        fields: Vec<String>,
        key: &'static str,
        value: &'static str,
    }

    impl StampModule {
        fn new(key: &'static str, value: &'static str) -> Self {
            Self {
                fields: vec![key.to_string()],
                key,
                value,
            }
        }
    }

    #[async_trait]
    impl CatalogModule for StampModule {
        fn name(&self) -> &'static str {
            "stamp"
        }

        fn output_fields(&self) -> &[String] {
            &self.fields
        }

        async fn run(&self, _ctx: &PullContext<'_>, _stats: &mut PullStats) -> Result<()> {
            Ok(())
        }

        async fn enrich_product(
            &self,
            _store: &StagingStore,
            product: &mut Product,
        ) -> Result<()> {
            product.add_datum(self.key, json!(self.value));
            Ok(())
        }

        async fn enrich_variant(
            &self,
            _store: &StagingStore,
            variant: &mut Variant,
        ) -> Result<()> {
            variant.add_datum(self.key, json!(self.value));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enrichment_is_last_write_wins_in_registration_order() {
        let (store, products, variants) = seeded_store().await;
        seed(
            &store,
            &products,
            &[StagedRow::new(10, None, r#"{"title":"a"}"#)],
        )
        .await;
        seed(
            &store,
            &variants,
            &[StagedRow::new(101, Some(10), r#"{"variant_sku":"A-1"}"#)],
        )
        .await;

        let x = StampModule::new("color", "red");
        let y = StampModule::new("color", "blue");
        let cursor = ProductCursor::new(&store, products, variants);
        let mut stream = ReassemblyStream::new(cursor, &store, vec![&x, &y]);

        let product = stream.next().await.unwrap().unwrap();
        assert_eq!(product.get("color"), Some(&json!("blue")));
        assert_eq!(product.variants[0].get("color"), Some(&json!("blue")));
    }
}
