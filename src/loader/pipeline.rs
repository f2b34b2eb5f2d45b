//! Load pipeline: writes a [`ParsedDump`] into a [`Store`] in dependency order.
//!
//! products → categories → product-category links → customers → similarity
//! links → reviews. Each stage runs inside [`Store::atomically`], so it is
//! committed whole before the next one starts.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use super::report::{FailedProduct, LoadReport};
use super::stage::LoadStage;
use super::store::{Store, StoreError};
use crate::entity::{ParsedDump, ProductRecord};
use crate::models::{NewCategory, NewCustomer, NewProduct, NewProductCategory, NewReview, NewSimilar};
use crate::runtime::LoaderConfig;

/// How product rows and their category links are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    /// One chunked set-based write per stage
    #[default]
    Bulk,
    /// One nested unit per product; a failing product is rolled back alone
    PerProduct,
}

impl LoadStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadStrategy::Bulk => "bulk",
            LoadStrategy::PerProduct => "per-product",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bulk" => Ok(LoadStrategy::Bulk),
            "per-product" | "per_product" => Ok(LoadStrategy::PerProduct),
            other => Err(format!("unknown strategy '{}' (expected bulk or per-product)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub strategy: LoadStrategy,
}

impl From<&LoaderConfig> for LoadOptions {
    fn from(config: &LoaderConfig) -> Self {
        LoadOptions {
            strategy: config.strategy,
        }
    }
}

/// A stage failed; earlier stages stay committed, later ones never ran.
#[derive(Debug)]
pub struct LoadError {
    pub stage: LoadStage,
    pub source: StoreError,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Load failed during {}: {}", self.stage, self.source)
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Write `dump` into `store`.
///
/// # Example
/// ```ignore
/// let dump = amzload::runtime::parse_file("amazon-meta.txt", InputEncoding::Utf8)?;
/// let mut store = MemoryStore::new();
/// let report = load(&dump, &mut store, &LoadOptions::default())?;
/// ```
pub fn load<S: Store>(
    dump: &ParsedDump,
    store: &mut S,
    options: &LoadOptions,
) -> Result<LoadReport, LoadError> {
    Loader::new(dump, *options).run(store)
}

#[derive(Debug, Default)]
struct ProductOutcome {
    product: usize,
    categories: usize,
    links: usize,
}

struct Loader<'a> {
    dump: &'a ParsedDump,
    options: LoadOptions,
    report: LoadReport,
    /// Ids of dump products present in the store
    loaded: HashSet<&'a str>,
    /// Reviews that survive the orphan filter, built by the customer stage
    reviews: Vec<NewReview>,
}

impl<'a> Loader<'a> {
    fn new(dump: &'a ParsedDump, options: LoadOptions) -> Self {
        Loader {
            dump,
            options,
            report: LoadReport::new(options.strategy),
            loaded: HashSet::new(),
            reviews: Vec::new(),
        }
    }

    fn run<S: Store>(mut self, store: &mut S) -> Result<LoadReport, LoadError> {
        let started = Instant::now();
        let span = info_span!("load_run", run_id = %self.report.run_id);
        let _enter = span.enter();

        info!(
            strategy = %self.options.strategy,
            products = self.dump.products.len(),
            reviews = self.dump.reviews.len(),
            similars = self.dump.similars.len(),
            "starting load"
        );

        let mut stage = LoadStage::Pending;
        while let Some(next) = stage.next() {
            stage = next;
            if stage.is_done() {
                break;
            }
            self.run_stage(stage, store)
                .map_err(|source| LoadError { stage, source })?;
        }

        self.report.totals = store
            .table_counts()
            .map_err(|source| LoadError { stage, source })?;
        self.report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            elapsed_ms = self.report.elapsed_ms,
            failed_products = self.report.failed_products.len(),
            "load complete"
        );
        Ok(self.report)
    }

    fn run_stage<S: Store>(&mut self, stage: LoadStage, store: &mut S) -> Result<(), StoreError> {
        debug!(%stage, "entering stage");
        match stage {
            LoadStage::WritingProducts => match self.options.strategy {
                LoadStrategy::Bulk => self.write_products(store),
                LoadStrategy::PerProduct => self.write_products_individually(store),
            },
            // Per-product units already wrote categories and links
            LoadStage::WritingCategories if self.options.strategy == LoadStrategy::Bulk => {
                self.write_categories(store)
            }
            LoadStage::WritingLinks if self.options.strategy == LoadStrategy::Bulk => {
                self.write_links(store)
            }
            LoadStage::WritingCustomers => self.write_customers(store),
            LoadStage::WritingSimilars => self.write_similars(store),
            LoadStage::WritingReviews => self.write_reviews(store),
            _ => Ok(()),
        }
    }

    fn write_products<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let dump = self.dump;
        let rows: Vec<NewProduct> = dump.products.iter().map(NewProduct::from).collect();

        let written = store.atomically(|store| store.insert_products(&rows))?;

        self.loaded = dump.products.iter().map(|p| p.id.as_str()).collect();
        self.report.products_written = written;
        self.report.products_skipped = rows.len() - written;
        info!(written, skipped = self.report.products_skipped, "products written");
        Ok(())
    }

    fn write_products_individually<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let dump = self.dump;
        let mut loaded = HashSet::new();
        let mut failed = Vec::new();
        let mut totals = ProductOutcome::default();
        let mut skipped = 0;

        store.atomically(|store| {
            for record in &dump.products {
                match store.atomically(|store| write_one_product(store, record)) {
                    Ok(outcome) => {
                        loaded.insert(record.id.as_str());
                        totals.product += outcome.product;
                        totals.categories += outcome.categories;
                        totals.links += outcome.links;
                        skipped += 1 - outcome.product;
                    }
                    Err(err) if err.is_recoverable() => {
                        warn!(product_id = %record.id, error = %err, "product rolled back");
                        failed.push(FailedProduct {
                            id: record.id.clone(),
                            reason: err.to_string(),
                        });
                    }
                    Err(err) => return Err(err),
                }
            }
            Ok(())
        })?;

        self.loaded = loaded;
        self.report.products_written = totals.product;
        self.report.products_skipped = skipped;
        self.report.categories_written = totals.categories;
        self.report.product_categories_written = totals.links;
        self.report.failed_products = failed;
        info!(
            written = totals.product,
            skipped,
            categories = totals.categories,
            links = totals.links,
            failed = self.report.failed_products.len(),
            "products written"
        );
        Ok(())
    }

    fn write_categories<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let rows: Vec<NewCategory> = self
            .category_names()
            .into_iter()
            .map(|name| NewCategory { name: name.to_string() })
            .collect();

        let written = store.atomically(|store| store.insert_categories(&rows))?;

        self.report.categories_written = written;
        info!(written, distinct = rows.len(), "categories written");
        Ok(())
    }

    fn write_links<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let dump = self.dump;
        let names: Vec<String> = self
            .category_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let written = store.atomically(|store| {
            let ids = store.category_ids(&names)?;
            let mut rows = Vec::new();
            for product in &dump.products {
                for name in product.distinct_categories() {
                    match ids.get(name) {
                        Some(&category_id) => rows.push(NewProductCategory {
                            product_id: product.id.clone(),
                            category_id,
                        }),
                        None => warn!(product_id = %product.id, category = name, "category id not found"),
                    }
                }
            }
            store.insert_product_categories(&rows)
        })?;

        self.report.product_categories_written = written;
        info!(written, "product-category links written");
        Ok(())
    }

    fn write_customers<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let dump = self.dump;
        let loaded = &self.loaded;
        let (kept, orphaned): (Vec<_>, Vec<_>) = dump
            .reviews
            .iter()
            .partition(|review| loaded.contains(review.product_id.as_str()));

        if !orphaned.is_empty() {
            warn!(count = orphaned.len(), "discarding reviews of products that were not loaded");
        }

        let customers: IndexSet<&str> = kept.iter().map(|r| r.customer_id.as_str()).collect();
        let rows: Vec<NewCustomer> = customers
            .into_iter()
            .map(|id| NewCustomer { id: id.to_string() })
            .collect();

        let written = store.atomically(|store| store.insert_customers(&rows))?;

        self.reviews = kept.into_iter().map(NewReview::from).collect();
        self.report.reviews_discarded = orphaned.len();
        self.report.customers_written = written;
        info!(written, distinct = rows.len(), "customers written");
        Ok(())
    }

    fn write_similars<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let dump = self.dump;

        let (written, kept) = store.atomically(|store| {
            let known = store.known_asins()?;
            let rows: Vec<NewSimilar> = dump
                .similars
                .iter()
                .filter_map(|link| {
                    let asin = link.asin.as_deref()?.trim();
                    let similar = link.similar_asin.trim();
                    (known.contains(asin) && known.contains(similar)).then(|| NewSimilar {
                        asin: asin.to_string(),
                        similar_asin: similar.to_string(),
                    })
                })
                .collect();
            let written = store.insert_similars(&rows)?;
            Ok((written, rows.len()))
        })?;

        self.report.similar_candidates = dump.similars.len();
        self.report.similars_written = written;
        self.report.similars_discarded = dump.similars.len() - kept;
        info!(
            written,
            discarded = self.report.similars_discarded,
            "similarity links written"
        );
        Ok(())
    }

    fn write_reviews<S: Store>(&mut self, store: &mut S) -> Result<(), StoreError> {
        let rows = std::mem::take(&mut self.reviews);
        let written = store.atomically(|store| store.copy_reviews(&rows))?;

        self.report.reviews_written = written;
        info!(written, "reviews written");
        Ok(())
    }

    /// Union of every product's category names, first occurrence order.
    fn category_names(&self) -> IndexSet<&'a str> {
        let dump = self.dump;
        dump.products
            .iter()
            .flat_map(|p| p.categories.iter().map(String::as_str))
            .collect()
    }
}

fn write_one_product<S: Store>(store: &mut S, record: &ProductRecord) -> Result<ProductOutcome, StoreError> {
    let product = store.insert_products(&[NewProduct::from(record)])?;

    let names: Vec<String> = record
        .distinct_categories()
        .into_iter()
        .map(str::to_string)
        .collect();
    let rows: Vec<NewCategory> = names.iter().map(|name| NewCategory { name: name.clone() }).collect();
    let categories = store.insert_categories(&rows)?;

    let ids = store.category_ids(&names)?;
    let links: Vec<NewProductCategory> = names
        .iter()
        .filter_map(|name| ids.get(name))
        .map(|&category_id| NewProductCategory {
            product_id: record.id.clone(),
            category_id,
        })
        .collect();
    let links = store.insert_product_categories(&links)?;

    Ok(ProductOutcome {
        product,
        categories,
        links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryStore;
    use crate::runtime::parse_str;

    const DUMP: &str = "\
Id:   1
ASIN: A1
  title: First
  group: Book
  salesrank: 10
  similar: 2  A2  ZZ
  categories: 1
   |Books[283155]|Subjects[1000]|Books[283155]
  reviews: total: 1  downloaded: 1  avg rating: 5
    2000-7-28  cutomer: C1  rating: 5  votes: 10  helpful: 9

Id:   2
ASIN: A2
  title: Second
  similar: 1  A1
  categories: 1
   |Books[283155]|Music[5174]
  reviews: total: 2  downloaded: 2  avg rating: 4
    2001-1-1  customer: C1  rating: 4  votes: 0  helpful: 0
    2001-1-2  customer: C2  rating: 3  votes: 1  helpful: 1
";

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("bulk".parse::<LoadStrategy>().unwrap(), LoadStrategy::Bulk);
        assert_eq!("Per-Product".parse::<LoadStrategy>().unwrap(), LoadStrategy::PerProduct);
        assert!("sideways".parse::<LoadStrategy>().is_err());
        assert_eq!(
            serde_json::to_string(&LoadStrategy::PerProduct).unwrap(),
            "\"per-product\""
        );
    }

    #[test]
    fn test_bulk_load_counts() {
        let dump = parse_str(DUMP);
        let mut store = MemoryStore::new();

        let report = load(&dump, &mut store, &LoadOptions::default()).unwrap();

        assert_eq!(report.products_written, 2);
        assert_eq!(report.categories_written, 3);
        assert_eq!(report.product_categories_written, 4);
        assert_eq!(report.customers_written, 2);
        assert_eq!(report.similar_candidates, 3);
        assert_eq!(report.similars_written, 2);
        assert_eq!(report.similars_discarded, 1);
        assert_eq!(report.reviews_written, 3);
        assert_eq!(report.totals, store.counts());
        assert_eq!(store.product("2").unwrap().product_group, crate::entity::UNGROUPED);
    }

    #[test]
    fn test_both_strategies_agree() {
        let dump = parse_str(DUMP);

        let mut bulk = MemoryStore::new();
        load(&dump, &mut bulk, &LoadOptions::default()).unwrap();

        let mut per_product = MemoryStore::new();
        let report = load(
            &dump,
            &mut per_product,
            &LoadOptions {
                strategy: LoadStrategy::PerProduct,
            },
        )
        .unwrap();

        assert!(report.failed_products.is_empty());
        assert_eq!(bulk.counts(), per_product.counts());
        assert_eq!(
            per_product.product_category_names("2"),
            vec!["Books[283155]", "Music[5174]"]
        );
    }

    #[test]
    fn test_load_error_names_stage() {
        let err = LoadError {
            stage: LoadStage::WritingReviews,
            source: StoreError::Rejected("bad rating".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Load failed during writing_reviews: Rejected write: bad rating"
        );
    }
}
