//! Products module (primary)
//!
//! Pulls products and their nested variants through one bulk query, shapes
//! each record into flat output fields, and stages them keyed by numeric id
//! with variants linked to their product through the record's explicit
//! parent reference. During reassembly this module drives the outer
//! iteration; it never enriches.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::bulk::{BulkPuller, RecordRouter};
use crate::module::{parse_global_id, CatalogModule, PullContext};
use crate::reassembly::ProductCursor;
use crate::session::{ExportOptions, Session};
use crate::staging::{BatchInserter, StagedRow, StagingStore};
use crate::stats::PullStats;
use shopfetch_common::Result;

/// Staging table kinds owned by this module.
const PRODUCTS_KIND: &str = "items";
const VARIANTS_KIND: &str = "variants";

/// How many option columns a split-columns export carries.
const SPLIT_OPTION_SLOTS: usize = 3;

pub struct ProductsModule {
    fields: Vec<String>,
    split_option_columns: bool,
    include_extra_fields: bool,
    include_tax_codes: bool,
    status_filter: Option<String>,
}

impl ProductsModule {
    pub fn new(session: &Session) -> Self {
        let options = session.options();
        Self {
            fields: Self::compute_fields(options),
            split_option_columns: options.split_option_columns,
            include_extra_fields: options.include_extra_fields,
            include_tax_codes: options.include_tax_codes,
            status_filter: options.status_filter.clone(),
        }
    }

    /// Output columns, shaped once from the session options: presence flags
    /// add columns, the split flag expands the option aggregate into
    /// name/value pairs and removes it.
    fn compute_fields(options: &ExportOptions) -> Vec<String> {
        let mut fields: Vec<String> = [
            "handle",
            "title",
            "body_html",
            "vendor",
            "product_type",
            "tags",
            "published",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if options.include_extra_fields {
            for extra in ["created_at", "updated_at", "template_suffix"] {
                fields.push(extra.to_string());
            }
        }

        for variant_field in [
            "variant_sku",
            "variant_price",
            "variant_compare_at_price",
            "variant_barcode",
            "variant_taxable",
            "variant_position",
        ] {
            fields.push(variant_field.to_string());
        }

        if options.include_tax_codes {
            fields.push("variant_tax_code".to_string());
        }

        if options.split_option_columns {
            for slot in 1..=SPLIT_OPTION_SLOTS {
                fields.push(format!("option_{}_name", slot));
                fields.push(format!("option_{}_value", slot));
            }
        } else {
            fields.push("variant_options".to_string());
        }

        fields
    }

    fn bulk_query(&self) -> String {
        let filter = match &self.status_filter {
            Some(status) => format!(
                "(query: {})",
                Value::String(format!("status:{}", status))
            ),
            None => String::new(),
        };

        format!(
            r#"{{
  products{filter} {{
    edges {{
      node {{
        id
        handle
        title
        descriptionHtml
        vendor
        productType
        tags
        status
        createdAt
        updatedAt
        templateSuffix
        variants {{
          edges {{
            node {{
              id
              sku
              price
              compareAtPrice
              barcode
              taxable
              taxCode
              position
              selectedOptions {{ name value }}
            }}
          }}
        }}
      }}
    }}
  }}
}}"#
        )
    }

    /// Flatten one bulk product record into output fields. `None` means the
    /// record had a usable id but an unusable payload; the caller stages a
    /// gap row so the reassembly order stays intact.
    fn shape_product(&self, record: &Value) -> Option<Value> {
        let handle = record.get("handle")?.as_str()?;

        let mut fields = Map::new();
        fields.insert("handle".into(), json!(handle));
        fields.insert(
            "title".into(),
            json!(record.get("title").and_then(Value::as_str).unwrap_or("")),
        );
        copy_str(record, "descriptionHtml", &mut fields, "body_html");
        copy_str(record, "vendor", &mut fields, "vendor");
        copy_str(record, "productType", &mut fields, "product_type");

        if let Some(tags) = record.get("tags").and_then(Value::as_array) {
            let joined = tags
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            fields.insert("tags".into(), json!(joined));
        }

        let published = record.get("status").and_then(Value::as_str) == Some("ACTIVE");
        fields.insert("published".into(), json!(published));

        if self.include_extra_fields {
            copy_str(record, "createdAt", &mut fields, "created_at");
            copy_str(record, "updatedAt", &mut fields, "updated_at");
            copy_str(record, "templateSuffix", &mut fields, "template_suffix");
        }

        Some(Value::Object(fields))
    }

    /// Flatten one bulk variant record. `None` drops the variant.
    fn shape_variant(&self, record: &Value) -> Option<Value> {
        let price = record.get("price")?.as_str()?;

        let mut fields = Map::new();
        fields.insert("variant_price".into(), json!(price));
        copy_str(record, "sku", &mut fields, "variant_sku");
        copy_str(record, "compareAtPrice", &mut fields, "variant_compare_at_price");
        copy_str(record, "barcode", &mut fields, "variant_barcode");

        if let Some(taxable) = record.get("taxable").and_then(Value::as_bool) {
            fields.insert("variant_taxable".into(), json!(taxable));
        }
        if let Some(position) = record.get("position").and_then(Value::as_i64) {
            fields.insert("variant_position".into(), json!(position));
        }
        if self.include_tax_codes {
            copy_str(record, "taxCode", &mut fields, "variant_tax_code");
        }

        let selected: Vec<(&str, &str)> = record
            .get("selectedOptions")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|o| {
                        Some((
                            o.get("name")?.as_str()?,
                            o.get("value")?.as_str()?,
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if self.split_option_columns {
            for (slot, (name, value)) in selected.iter().take(SPLIT_OPTION_SLOTS).enumerate() {
                fields.insert(format!("option_{}_name", slot + 1), json!(name));
                fields.insert(format!("option_{}_value", slot + 1), json!(value));
            }
        } else {
            let aggregate = selected
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
                .collect::<Vec<_>>()
                .join(" / ");
            fields.insert("variant_options".into(), json!(aggregate));
        }

        Some(Value::Object(fields))
    }
}

fn copy_str(record: &Value, from: &str, fields: &mut Map<String, Value>, to: &str) {
    if let Some(value) = record.get(from).and_then(Value::as_str) {
        fields.insert(to.to_string(), json!(value));
    }
}

#[async_trait]
impl CatalogModule for ProductsModule {
    fn name(&self) -> &'static str {
        "products"
    }

    fn output_fields(&self) -> &[String] {
        &self.fields
    }

    async fn run(&self, ctx: &PullContext<'_>, stats: &mut PullStats) -> Result<()> {
        let products = ctx.store.table(self.name(), PRODUCTS_KIND)?;
        let variants = ctx.store.table(self.name(), VARIANTS_KIND)?;
        ctx.store.create_table(&products).await?;
        ctx.store.create_table(&variants).await?;

        let mut router = ProductRouter {
            module: self,
            products: BatchInserter::from_config(ctx.store, products, ctx.config),
            variants: BatchInserter::from_config(ctx.store, variants, ctx.config),
        };

        let puller = BulkPuller::new(ctx.transport, ctx.config);
        puller
            .pull(&self.bulk_query(), &mut router, stats)
            .await?;

        tracing::info!(
            products = stats.products,
            variants = stats.variants,
            "Products module staged"
        );
        Ok(())
    }

    fn products<'a>(&self, store: &'a StagingStore) -> Result<ProductCursor<'a>> {
        let products = store.table(self.name(), PRODUCTS_KIND)?;
        let variants = store.table(self.name(), VARIANTS_KIND)?;
        Ok(ProductCursor::new(store, products, variants))
    }
}

/// Routes bulk records into the products or variants table. The split is
/// driven solely by the explicit parent reference on the record.
struct ProductRouter<'a> {
    module: &'a ProductsModule,
    products: BatchInserter<'a>,
    variants: BatchInserter<'a>,
}

#[async_trait]
impl RecordRouter for ProductRouter<'_> {
    async fn route(&mut self, record: Value, stats: &mut PullStats) -> Result<()> {
        match record.get("__parentId") {
            Some(parent) => {
                let (Some(id), Some(parent_id)) = (
                    record.get("id").and_then(parse_global_id),
                    parse_global_id(parent),
                ) else {
                    stats.inc_variant_error();
                    tracing::warn!("Variant record without usable ids, skipping");
                    return Ok(());
                };

                match self.module.shape_variant(&record) {
                    Some(data) => {
                        self.variants
                            .push(StagedRow::new(id, Some(parent_id), data.to_string()))
                            .await?;
                        stats.inc_variant();
                    }
                    None => {
                        stats.inc_variant_error();
                        tracing::warn!(variant_id = id, "Unusable variant payload, skipping");
                    }
                }
            }
            None => {
                let Some(id) = record.get("id").and_then(parse_global_id) else {
                    stats.inc_product_error();
                    tracing::warn!("Product record without usable id, skipping");
                    return Ok(());
                };

                match self.module.shape_product(&record) {
                    Some(data) => {
                        self.products
                            .push(StagedRow::new(id, None, data.to_string()))
                            .await?;
                        stats.inc_product();
                    }
                    None => {
                        // Keep the id in the sequence so reassembly stays
                        // resumable; the row just carries no payload.
                        self.products.push(StagedRow::gap(id)).await?;
                        stats.inc_product_error();
                        tracing::warn!(product_id = id, "Unusable product payload, staged gap row");
                    }
                }
            }
        }
        Ok(())
    }

    async fn finish(&mut self, _stats: &mut PullStats) -> Result<()> {
        self.products.flush().await?;
        self.variants.flush().await?;
        Ok(())
    }
}
