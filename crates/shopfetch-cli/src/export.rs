//! Denormalized CSV export
//!
//! The serialization collaborator at the end of the pipeline: consumes the
//! reassembly stream and writes one CSV row per variant (or a single row for
//! a variant-less product), with variant fields overriding product fields
//! column by column.

use std::io::Write;
use std::path::Path;

use serde_json::Value;
use shopfetch_common::{PullError, Result};
use shopfetch_core::reassembly::ReassemblyStream;
use shopfetch_core::{Product, Variant};

pub struct CsvExporter {
    columns: Vec<String>,
}

impl CsvExporter {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Drain the stream into a CSV file. Returns the number of data rows
    /// written.
    pub async fn write_stream(
        &self,
        stream: &mut ReassemblyStream<'_>,
        path: &Path,
    ) -> Result<u64> {
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| PullError::Infrastructure(format!("Failed to open output file: {}", e)))?;

        self.write_header(&mut writer)?;

        let mut rows = 0;
        while let Some(product) = stream.next().await? {
            rows += self.write_product(&mut writer, &product)?;
        }

        writer
            .flush()
            .map_err(|e| PullError::Infrastructure(format!("Failed to flush output file: {}", e)))?;
        Ok(rows)
    }

    pub fn write_header<W: Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        writer
            .write_record(&self.columns)
            .map_err(|e| PullError::Infrastructure(format!("Failed to write CSV header: {}", e)))
    }

    /// One row per variant; a product without variants still gets one row.
    pub fn write_product<W: Write>(
        &self,
        writer: &mut csv::Writer<W>,
        product: &Product,
    ) -> Result<u64> {
        if product.variants.is_empty() {
            self.write_row(writer, product, None)?;
            return Ok(1);
        }

        for variant in &product.variants {
            self.write_row(writer, product, Some(variant))?;
        }
        Ok(product.variants.len() as u64)
    }

    fn write_row<W: Write>(
        &self,
        writer: &mut csv::Writer<W>,
        product: &Product,
        variant: Option<&Variant>,
    ) -> Result<()> {
        let row: Vec<String> = self
            .columns
            .iter()
            .map(|column| {
                variant
                    .and_then(|v| v.get(column))
                    .or_else(|| product.get(column))
                    .map(value_to_cell)
                    .unwrap_or_default()
            })
            .collect();

        writer
            .write_record(&row)
            .map_err(|e| PullError::Infrastructure(format!("Failed to write CSV row: {}", e)))
    }
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(exporter: &CsvExporter, products: &[Product]) -> String {
        let mut writer = csv::Writer::from_writer(Vec::new());
        exporter.write_header(&mut writer).unwrap();
        for product in products {
            exporter.write_product(&mut writer, product).unwrap();
        }
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    fn columns() -> Vec<String> {
        ["handle", "title", "variant_sku", "variant_price"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_one_row_per_variant() {
        let mut product = Product::new(10);
        product.add_data(&json!({"handle": "mug", "title": "Mug"}));

        let mut v1 = Variant::new(101, 10);
        v1.add_data(&json!({"variant_sku": "A-1", "variant_price": "5.00"}));
        let mut v2 = Variant::new(102, 10);
        v2.add_data(&json!({"variant_sku": "A-2", "variant_price": "6.00"}));
        product.variants.push(v1);
        product.variants.push(v2);

        let output = render(&CsvExporter::new(columns()), &[product]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "handle,title,variant_sku,variant_price");
        assert_eq!(lines[1], "mug,Mug,A-1,5.00");
        assert_eq!(lines[2], "mug,Mug,A-2,6.00");
    }

    #[test]
    fn test_product_without_variants_gets_one_row() {
        let mut product = Product::new(30);
        product.add_data(&json!({"handle": "poster", "title": "Poster"}));

        let output = render(&CsvExporter::new(columns()), &[product]);
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "poster,Poster,,");
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(value_to_cell(&json!("x")), "x");
        assert_eq!(value_to_cell(&json!(7)), "7");
        assert_eq!(value_to_cell(&json!(true)), "true");
        assert_eq!(value_to_cell(&json!(null)), "");
    }

    #[test]
    fn test_variant_value_overrides_product_value() {
        let exporter = CsvExporter::new(vec!["title".to_string()]);
        let mut product = Product::new(10);
        product.add_data(&json!({"title": "Product title"}));
        let mut variant = Variant::new(101, 10);
        variant.add_data(&json!({"title": "Variant title"}));
        product.variants.push(variant);

        let output = render(&exporter, &[product]);
        assert!(output.contains("Variant title"));
        assert!(!output.contains("Product title"));
    }
}
