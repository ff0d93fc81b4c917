//! Pull run statistics
//!
//! Plain counters shared across one run: pullers write, the caller reads
//! them for reporting. Nothing here is persisted.

use serde::{Deserialize, Serialize};

/// Counters collected during one pull run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullStats {
    /// Paginated REST pages fetched.
    pub pages: u64,
    /// Product records staged.
    pub products: u64,
    /// Variant records staged.
    pub variants: u64,
    /// Non-fatal anomalies (conflict retries, skipped records).
    pub warnings: u64,
    /// Bulk result lines that failed to parse, and other unattributable
    /// record failures.
    pub general_errors: u64,
    /// Product records with a usable id but unusable payload.
    pub product_errors: u64,
    /// Variant records that could not be staged.
    pub variant_errors: u64,
}

impl PullStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_page(&mut self) {
        self.pages += 1;
    }

    pub fn inc_product(&mut self) {
        self.products += 1;
    }

    pub fn inc_variant(&mut self) {
        self.variants += 1;
    }

    pub fn inc_warning(&mut self) {
        self.warnings += 1;
    }

    pub fn inc_general_error(&mut self) {
        self.general_errors += 1;
    }

    pub fn inc_product_error(&mut self) {
        self.product_errors += 1;
    }

    pub fn inc_variant_error(&mut self) {
        self.variant_errors += 1;
    }

    /// Total error count across all categories.
    pub fn total_errors(&self) -> u64 {
        self.general_errors + self.product_errors + self.variant_errors
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors() > 0
    }

    /// Merge another run's counters into this one.
    pub fn merge(&mut self, other: &PullStats) {
        self.pages += other.pages;
        self.products += other.products;
        self.variants += other.variants;
        self.warnings += other.warnings;
        self.general_errors += other.general_errors;
        self.product_errors += other.product_errors;
        self.variant_errors += other.variant_errors;
    }
}

impl std::fmt::Display for PullStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} products, {} variants, {} pages, {} warnings, {} errors",
            self.products,
            self.variants,
            self.pages,
            self.warnings,
            self.total_errors()
        )
    }
}
