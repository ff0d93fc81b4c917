//! Composite catalog entities assembled during reassembly
//!
//! Products and variants exist only between the staging store and the
//! downstream serializer. Field maps accumulate through repeated
//! [`Product::add_data`] merges, one per contributing module, with
//! last-write-wins semantics. The numeric `id` is special: it always comes
//! from the staging row and is never overwritten from a decoded payload,
//! because payloads carry the API-global identifier instead.

use serde_json::{Map, Value};

/// A product with exclusively-owned nested variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: i64,
    fields: Map<String, Value>,
    pub variants: Vec<Variant>,
}

impl Product {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fields: Map::new(),
            variants: Vec::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Merge a decoded payload into this product, last write wins.
    /// The `id` key is skipped; see the module docs.
    pub fn add_data(&mut self, data: &Value) {
        merge_fields(&mut self.fields, data);
    }

    /// Set a single field, overwriting any previous value.
    pub fn add_datum(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// A single variant, owned by exactly one product.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    id: i64,
    parent_id: i64,
    fields: Map<String, Value>,
}

impl Variant {
    pub fn new(id: i64, parent_id: i64) -> Self {
        Self {
            id,
            parent_id,
            fields: Map::new(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn parent_id(&self) -> i64 {
        self.parent_id
    }

    /// Merge a decoded payload into this variant, last write wins, `id`
    /// skipped.
    pub fn add_data(&mut self, data: &Value) {
        merge_fields(&mut self.fields, data);
    }

    pub fn add_datum(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

fn merge_fields(fields: &mut Map<String, Value>, data: &Value) {
    let Some(object) = data.as_object() else {
        return;
    };
    for (key, value) in object {
        if key == "id" {
            continue;
        }
        fields.insert(key.clone(), value.clone());
    }
}
