//! Module registry
//!
//! Builds the enabled module set from the session, in the order the data
//! types were enabled. That order is load-bearing: it fixes the enrichment
//! sequence, and with it which module wins on conflicting fields.

use crate::module::{
    CatalogModule, CollectionsModule, InventoryModule, MetafieldsModule, ProductsModule,
};
use crate::session::{DataType, Session};
use shopfetch_common::{PullError, Result};

pub struct ModuleRegistry {
    modules: Vec<Box<dyn CatalogModule>>,
    primary_index: usize,
}

impl ModuleRegistry {
    pub fn from_session(session: &Session) -> Result<Self> {
        let mut modules: Vec<Box<dyn CatalogModule>> = Vec::new();
        let mut primary_index = None;

        for data_type in session.data_types() {
            match data_type {
                DataType::Products => {
                    primary_index = Some(modules.len());
                    modules.push(Box::new(ProductsModule::new(session)));
                }
                DataType::Inventory => modules.push(Box::new(InventoryModule::new())),
                DataType::Metafields => modules.push(Box::new(MetafieldsModule::new(session))),
                DataType::Collections => modules.push(Box::new(CollectionsModule::new())),
            }
        }

        let primary_index = primary_index.ok_or_else(|| {
            PullError::Validation("No primary module enabled for this run".into())
        })?;

        Ok(Self {
            modules,
            primary_index,
        })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// All enabled modules in registration order.
    pub fn modules(&self) -> impl Iterator<Item = &dyn CatalogModule> + '_ {
        self.modules.iter().map(|m| m.as_ref())
    }

    /// The module driving the outer reassembly iteration.
    pub fn primary(&self) -> &dyn CatalogModule {
        self.modules[self.primary_index].as_ref()
    }

    /// Every module except the primary, in registration order.
    pub fn enrichers(&self) -> Vec<&dyn CatalogModule> {
        self.modules
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.primary_index)
            .map(|(_, m)| m.as_ref())
            .collect()
    }

    /// Output columns composed across modules in registration order, first
    /// occurrence wins on duplicates.
    pub fn output_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        for module in self.modules() {
            for field in module.output_fields() {
                if !fields.contains(field) {
                    fields.push(field.clone());
                }
            }
        }
        fields
    }
}
