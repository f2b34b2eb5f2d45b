//! [`Store`] backed by a pooled PostgreSQL connection.

use std::collections::{HashMap, HashSet};

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;

use super::operations::{copy_reviews, REVIEWS_ENTITY};
use crate::diesel_runtime::{
    effective_chunk_size, ensure_tables, write_in_chunks, BulkInsert, Database, PooledConnection,
};
use crate::loader::{Store, StoreError, TableCounts};
use crate::models::{NewCategory, NewCustomer, NewProduct, NewProductCategory, NewReview, NewSimilar};
use crate::schema::*;

pub struct PgStore {
    conn: PooledConnection,
    chunk_size: usize,
}

impl PgStore {
    pub fn new(conn: PooledConnection, chunk_size: usize) -> Self {
        PgStore { conn, chunk_size }
    }

    /// Check a connection out of the pool for the whole run.
    pub fn connect(database: &Database, chunk_size: usize) -> Result<Self, StoreError> {
        Ok(Self::new(database.get_connection()?, chunk_size))
    }

    /// Create the normalized tables if they are missing.
    pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
        ensure_tables(&mut *self.conn)?;
        Ok(())
    }

    fn insert_all<T: BulkInsert>(&mut self, rows: &[T]) -> Result<usize, StoreError> {
        let chunk_size = effective_chunk_size(self.chunk_size, T::COLUMNS);
        let conn = &mut *self.conn;
        write_in_chunks(rows, chunk_size, T::ENTITY, |chunk| T::bulk_insert(conn, chunk))
            .map_err(StoreError::from)
    }
}

impl Store for PgStore {
    fn insert_products(&mut self, rows: &[NewProduct]) -> Result<usize, StoreError> {
        self.insert_all(rows)
    }

    fn insert_categories(&mut self, rows: &[NewCategory]) -> Result<usize, StoreError> {
        self.insert_all(rows)
    }

    fn category_ids(&mut self, names: &[String]) -> Result<HashMap<String, i32>, StoreError> {
        let chunk_size = effective_chunk_size(self.chunk_size, 1);
        let mut ids = HashMap::with_capacity(names.len());

        for chunk in names.chunks(chunk_size) {
            let found: Vec<(String, i32)> = categories::table
                .filter(categories::name.eq_any(chunk))
                .select((categories::name, categories::id))
                .load(&mut *self.conn)?;
            ids.extend(found);
        }

        Ok(ids)
    }

    fn insert_product_categories(&mut self, rows: &[NewProductCategory]) -> Result<usize, StoreError> {
        self.insert_all(rows)
    }

    fn insert_customers(&mut self, rows: &[NewCustomer]) -> Result<usize, StoreError> {
        self.insert_all(rows)
    }

    fn known_asins(&mut self) -> Result<HashSet<String>, StoreError> {
        let asins: Vec<Option<String>> = products::table
            .select(products::asin)
            .filter(products::asin.is_not_null())
            .load(&mut *self.conn)?;

        Ok(asins
            .into_iter()
            .flatten()
            .map(|asin| asin.trim().to_string())
            .collect())
    }

    fn insert_similars(&mut self, rows: &[NewSimilar]) -> Result<usize, StoreError> {
        self.insert_all(rows)
    }

    fn copy_reviews(&mut self, rows: &[NewReview]) -> Result<usize, StoreError> {
        let conn = &mut *self.conn;
        write_in_chunks(rows, self.chunk_size, REVIEWS_ENTITY, |chunk| copy_reviews(conn, chunk))
            .map_err(StoreError::from)
    }

    fn table_counts(&mut self) -> Result<TableCounts, StoreError> {
        let conn = &mut *self.conn;
        let count = |n: i64| n as usize;

        Ok(TableCounts {
            products: count(products::table.count().get_result(conn)?),
            categories: count(categories::table.count().get_result(conn)?),
            product_categories: count(product_categories::table.count().get_result(conn)?),
            customers: count(customers::table.count().get_result(conn)?),
            similar_products: count(similar_products::table.count().get_result(conn)?),
            reviews: count(reviews::table.count().get_result(conn)?),
        })
    }

    fn begin_unit(&mut self) -> Result<(), StoreError> {
        AnsiTransactionManager::begin_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn commit_unit(&mut self) -> Result<(), StoreError> {
        AnsiTransactionManager::commit_transaction(&mut *self.conn)?;
        Ok(())
    }

    fn rollback_unit(&mut self) -> Result<(), StoreError> {
        AnsiTransactionManager::rollback_transaction(&mut *self.conn)?;
        Ok(())
    }
}
