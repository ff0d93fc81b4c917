//! Per-run session settings
//!
//! A [`Session`] is created once per pull request and is read-only for the
//! rest of the run. It carries the target shop identity, the enabled data
//! types, and the output-shaping flags that modules consult when computing
//! their output columns.

use shopfetch_common::{PullError, Result};

/// A catalog data type that can be enabled for extraction.
///
/// The order in which types appear in [`Session::data_types`] is the module
/// registration order, which in turn fixes the enrichment order during
/// reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Products,
    Inventory,
    Metafields,
    Collections,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Products => "products",
            DataType::Inventory => "inventory",
            DataType::Metafields => "metafields",
            DataType::Collections => "collections",
        }
    }
}

impl std::str::FromStr for DataType {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "products" => Ok(DataType::Products),
            "inventory" | "inventories" => Ok(DataType::Inventory),
            "metafields" => Ok(DataType::Metafields),
            "collections" => Ok(DataType::Collections),
            other => Err(PullError::Validation(format!(
                "Unknown data type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output-shaping flags.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Expand each variant's option aggregate into separate
    /// `option_N_name`/`option_N_value` columns and drop the aggregate.
    pub split_option_columns: bool,
    /// Include created/updated timestamps and template columns.
    pub include_extra_fields: bool,
    /// Include the variant tax-rate code column.
    pub include_tax_codes: bool,
    /// Metafield keys to export, as `namespace.key` strings.
    pub metafield_keys: Vec<String>,
    /// Restrict products to one published status (e.g. "ACTIVE").
    pub status_filter: Option<String>,
}

/// Immutable-for-the-run session settings.
#[derive(Debug, Clone)]
pub struct Session {
    shop_domain: String,
    access_token: String,
    run_id: String,
    data_types: Vec<DataType>,
    options: ExportOptions,
}

impl Session {
    pub fn new(
        shop_domain: impl Into<String>,
        access_token: impl Into<String>,
        run_id: impl Into<String>,
        data_types: Vec<DataType>,
        options: ExportOptions,
    ) -> Result<Self> {
        let session = Self {
            shop_domain: shop_domain.into(),
            access_token: access_token.into(),
            run_id: run_id.into(),
            data_types,
            options,
        };
        session.validate()?;
        Ok(session)
    }

    fn validate(&self) -> Result<()> {
        if self.shop_domain.is_empty() {
            return Err(PullError::Validation("Shop domain cannot be empty".into()));
        }
        if self.access_token.is_empty() {
            return Err(PullError::Validation("Access token cannot be empty".into()));
        }
        if self.data_types.is_empty() {
            return Err(PullError::Validation(
                "At least one data type must be enabled".into(),
            ));
        }
        if !self.data_types.contains(&DataType::Products) {
            return Err(PullError::Validation(
                "The products data type must be enabled; it drives reassembly".into(),
            ));
        }
        let mut seen = Vec::new();
        for dt in &self.data_types {
            if seen.contains(dt) {
                return Err(PullError::Validation(format!(
                    "Data type enabled twice: {}",
                    dt
                )));
            }
            seen.push(*dt);
        }
        if self.run_id.is_empty()
            || !self
                .run_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(PullError::Validation(format!(
                "Run id must be non-empty and alphanumeric: {:?}",
                self.run_id
            )));
        }
        Ok(())
    }

    pub fn shop_domain(&self) -> &str {
        &self.shop_domain
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn data_types(&self) -> &[DataType] {
        &self.data_types
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Prefix for this run's staging tables. Runs sharing one staging
    /// database stay isolated through this prefix.
    pub fn staging_prefix(&self) -> String {
        format!("run_{}", self.run_id)
    }
}
