//! Summary of one load run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pipeline::LoadStrategy;
use super::store::TableCounts;

/// A product whose unit of work was rolled back in a per-product pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedProduct {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub strategy: LoadStrategy,
    pub products_written: usize,
    /// Products already present, by id
    pub products_skipped: usize,
    pub categories_written: usize,
    pub product_categories_written: usize,
    pub customers_written: usize,
    pub similar_candidates: usize,
    pub similars_written: usize,
    /// Pairs without a main ASIN or with an endpoint that is not a stored ASIN
    pub similars_discarded: usize,
    pub reviews_written: usize,
    /// Reviews whose product was not loaded
    pub reviews_discarded: usize,
    pub failed_products: Vec<FailedProduct>,
    /// Table sizes after the run
    pub totals: TableCounts,
    pub elapsed_ms: u64,
}

impl LoadReport {
    pub fn new(strategy: LoadStrategy) -> Self {
        LoadReport {
            run_id: Uuid::new_v4(),
            strategy,
            products_written: 0,
            products_skipped: 0,
            categories_written: 0,
            product_categories_written: 0,
            customers_written: 0,
            similar_candidates: 0,
            similars_written: 0,
            similars_discarded: 0,
            reviews_written: 0,
            reviews_discarded: 0,
            failed_products: Vec::new(),
            totals: TableCounts::default(),
            elapsed_ms: 0,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
