//! In-memory relational store.
//!
//! Applies the same conflict, foreign-key and check rules as the Postgres
//! schema. Used for `--dry-run` and tests.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use super::store::{Store, StoreError, TableCounts};
use crate::models::{NewCategory, NewCustomer, NewProduct, NewProductCategory, NewReview, NewSimilar};

/// One inverse operation, replayed on rollback.
#[derive(Debug)]
enum Undo {
    Product(String),
    Category(String),
    Link(String, i32),
    Customer(String),
    Similar(String, String),
    Reviews(usize),
}

#[derive(Debug)]
pub struct MemoryStore {
    products: IndexMap<String, NewProduct>,
    categories: IndexMap<String, i32>,
    category_names: HashMap<i32, String>,
    /// Like a sequence, never rewound by rollback
    next_category_id: i32,
    links: IndexSet<(String, i32)>,
    customers: IndexSet<String>,
    similars: IndexSet<(String, String)>,
    reviews: Vec<NewReview>,
    journal: Vec<Undo>,
    units: Vec<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            products: IndexMap::new(),
            categories: IndexMap::new(),
            category_names: HashMap::new(),
            next_category_id: 1,
            links: IndexSet::new(),
            customers: IndexSet::new(),
            similars: IndexSet::new(),
            reviews: Vec::new(),
            journal: Vec::new(),
            units: Vec::new(),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            products: self.products.len(),
            categories: self.categories.len(),
            product_categories: self.links.len(),
            customers: self.customers.len(),
            similar_products: self.similars.len(),
            reviews: self.reviews.len(),
        }
    }

    pub fn product(&self, id: &str) -> Option<&NewProduct> {
        self.products.get(id)
    }

    pub fn category_id(&self, name: &str) -> Option<i32> {
        self.categories.get(name).copied()
    }

    /// Category names linked to a product, in insertion order.
    pub fn product_category_names(&self, product_id: &str) -> Vec<&str> {
        self.links
            .iter()
            .filter(|(pid, _)| pid == product_id)
            .filter_map(|(_, cid)| self.category_names.get(cid).map(String::as_str))
            .collect()
    }

    pub fn has_customer(&self, id: &str) -> bool {
        self.customers.contains(id)
    }

    pub fn similars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.similars.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    pub fn reviews(&self) -> &[NewReview] {
        &self.reviews
    }

    fn record(&mut self, undo: Undo) {
        if !self.units.is_empty() {
            self.journal.push(undo);
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::Product(id) => {
                self.products.shift_remove(&id);
            }
            Undo::Category(name) => {
                if let Some(id) = self.categories.shift_remove(&name) {
                    self.category_names.remove(&id);
                }
            }
            Undo::Link(pid, cid) => {
                self.links.shift_remove(&(pid, cid));
            }
            Undo::Customer(id) => {
                self.customers.shift_remove(&id);
            }
            Undo::Similar(asin, similar) => {
                self.similars.shift_remove(&(asin, similar));
            }
            Undo::Reviews(len) => self.reviews.truncate(len),
        }
    }
}

impl Store for MemoryStore {
    fn insert_products(&mut self, rows: &[NewProduct]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for row in rows {
            if !self.products.contains_key(&row.id) {
                self.products.insert(row.id.clone(), row.clone());
                self.record(Undo::Product(row.id.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn insert_categories(&mut self, rows: &[NewCategory]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for row in rows {
            if !self.categories.contains_key(&row.name) {
                let id = self.next_category_id;
                self.next_category_id += 1;
                self.categories.insert(row.name.clone(), id);
                self.category_names.insert(id, row.name.clone());
                self.record(Undo::Category(row.name.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn category_ids(&mut self, names: &[String]) -> Result<HashMap<String, i32>, StoreError> {
        Ok(names
            .iter()
            .filter_map(|name| self.categories.get(name).map(|id| (name.clone(), *id)))
            .collect())
    }

    fn insert_product_categories(&mut self, rows: &[NewProductCategory]) -> Result<usize, StoreError> {
        // A statement either applies whole or not at all
        for row in rows {
            if !self.products.contains_key(&row.product_id) {
                return Err(StoreError::Rejected(format!(
                    "product_categories references unknown product '{}'",
                    row.product_id
                )));
            }
            if !self.category_names.contains_key(&row.category_id) {
                return Err(StoreError::Rejected(format!(
                    "product_categories references unknown category {}",
                    row.category_id
                )));
            }
        }

        let mut inserted = 0;
        for row in rows {
            if self.links.insert((row.product_id.clone(), row.category_id)) {
                self.record(Undo::Link(row.product_id.clone(), row.category_id));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn insert_customers(&mut self, rows: &[NewCustomer]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for row in rows {
            if self.customers.insert(row.id.clone()) {
                self.record(Undo::Customer(row.id.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn known_asins(&mut self) -> Result<HashSet<String>, StoreError> {
        Ok(self
            .products
            .values()
            .filter_map(|p| p.asin.as_deref())
            .map(|asin| asin.trim().to_string())
            .collect())
    }

    fn insert_similars(&mut self, rows: &[NewSimilar]) -> Result<usize, StoreError> {
        let mut inserted = 0;
        for row in rows {
            if self.similars.insert((row.asin.clone(), row.similar_asin.clone())) {
                self.record(Undo::Similar(row.asin.clone(), row.similar_asin.clone()));
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn copy_reviews(&mut self, rows: &[NewReview]) -> Result<usize, StoreError> {
        for row in rows {
            if !self.products.contains_key(&row.product_id) {
                return Err(StoreError::Rejected(format!(
                    "review references unknown product '{}'",
                    row.product_id
                )));
            }
            if !self.customers.contains(&row.customer_id) {
                return Err(StoreError::Rejected(format!(
                    "review references unknown customer '{}'",
                    row.customer_id
                )));
            }
            if !(0..=5).contains(&row.rating) {
                return Err(StoreError::Rejected(format!("review rating {} outside 0..=5", row.rating)));
            }
        }

        let before = self.reviews.len();
        self.reviews.extend_from_slice(rows);
        self.record(Undo::Reviews(before));
        Ok(rows.len())
    }

    fn table_counts(&mut self) -> Result<TableCounts, StoreError> {
        Ok(self.counts())
    }

    fn begin_unit(&mut self) -> Result<(), StoreError> {
        self.units.push(self.journal.len());
        Ok(())
    }

    fn commit_unit(&mut self) -> Result<(), StoreError> {
        self.units
            .pop()
            .ok_or_else(|| StoreError::Rejected("commit without an open unit".to_string()))?;
        if self.units.is_empty() {
            self.journal.clear();
        }
        Ok(())
    }

    fn rollback_unit(&mut self) -> Result<(), StoreError> {
        let mark = self
            .units
            .pop()
            .ok_or_else(|| StoreError::Rejected("rollback without an open unit".to_string()))?;
        while self.journal.len() > mark {
            if let Some(undo) = self.journal.pop() {
                self.revert(undo);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, asin: &str) -> NewProduct {
        NewProduct {
            id: id.to_string(),
            asin: Some(asin.to_string()),
            title: "Title".to_string(),
            product_group: "Book".to_string(),
            salesrank: None,
        }
    }

    #[test]
    fn test_first_write_wins() {
        let mut store = MemoryStore::new();
        let mut second = product("1", "B2");
        second.title = "Other".to_string();

        assert_eq!(store.insert_products(&[product("1", "B1")]).unwrap(), 1);
        assert_eq!(store.insert_products(&[second]).unwrap(), 0);
        assert_eq!(store.product("1").unwrap().asin.as_deref(), Some("B1"));
    }

    #[test]
    fn test_category_ids_are_stable() {
        let mut store = MemoryStore::new();
        let books = NewCategory { name: "Books".to_string() };
        store.insert_categories(&[books.clone()]).unwrap();
        store.insert_categories(&[books, NewCategory { name: "Music".to_string() }]).unwrap();

        let ids = store
            .category_ids(&["Books".to_string(), "Music".to_string(), "Nope".to_string()])
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids["Books"], 1);
        assert_eq!(ids["Music"], 2);
    }

    #[test]
    fn test_foreign_keys_reject_whole_batch() {
        let mut store = MemoryStore::new();
        store.insert_products(&[product("1", "B1")]).unwrap();
        store.insert_categories(&[NewCategory { name: "Books".to_string() }]).unwrap();

        let rows = vec![
            NewProductCategory { product_id: "1".to_string(), category_id: 1 },
            NewProductCategory { product_id: "9".to_string(), category_id: 1 },
        ];
        let err = store.insert_product_categories(&rows).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert_eq!(store.counts().product_categories, 0);
    }

    #[test]
    fn test_nested_rollback_keeps_outer_work() {
        let mut store = MemoryStore::new();

        let result: Result<(), StoreError> = store.atomically(|store| {
            store.insert_products(&[product("1", "B1")])?;
            let inner: Result<(), StoreError> = store.atomically(|store| {
                store.insert_products(&[product("2", "B2")])?;
                store.insert_categories(&[NewCategory { name: "Books".to_string() }])?;
                Err(StoreError::Rejected("boom".to_string()))
            });
            assert!(inner.is_err());
            Ok(())
        });

        assert!(result.is_ok());
        let counts = store.counts();
        assert_eq!(counts.products, 1);
        assert_eq!(counts.categories, 0);

        // Rolled-back ids are not reused
        store.insert_categories(&[NewCategory { name: "Music".to_string() }]).unwrap();
        assert_eq!(store.category_id("Music"), Some(2));
    }

    #[test]
    fn test_review_checks() {
        let mut store = MemoryStore::new();
        store.insert_products(&[product("1", "B1")]).unwrap();

        let review = NewReview {
            product_id: "1".to_string(),
            customer_id: "C1".to_string(),
            review_date: chrono::NaiveDate::from_ymd_opt(2001, 1, 1).unwrap(),
            rating: 4,
            votes: 1,
            helpful: 1,
        };
        assert!(store.copy_reviews(&[review.clone()]).is_err());

        store.insert_customers(&[NewCustomer { id: "C1".to_string() }]).unwrap();
        assert_eq!(store.copy_reviews(&[review.clone(), review]).unwrap(), 2);
        assert_eq!(store.reviews().len(), 2);
    }
}
