//! `BulkInsert` implementations for every insertable model.
//!
//! All writes skip on key conflict. Reviews have no natural key and go
//! through `COPY FROM STDIN` instead.

use diesel::prelude::*;

use crate::diesel_runtime::{BulkInsert, DbConnection};
use crate::models::*;
use crate::schema::*;

// ============================================================================
// NewProduct - skip on id conflict, first write wins
// ============================================================================

impl BulkInsert for NewProduct {
    const ENTITY: &'static str = "products";
    const COLUMNS: usize = 5;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(products::table)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)
    }
}

// ============================================================================
// NewCategory - skip on name conflict
// ============================================================================

impl BulkInsert for NewCategory {
    const ENTITY: &'static str = "categories";
    const COLUMNS: usize = 1;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(categories::table)
            .values(rows)
            .on_conflict(categories::name)
            .do_nothing()
            .execute(conn)
    }
}

// ============================================================================
// NewProductCategory - skip on (product_id, category_id) conflict
// ============================================================================

impl BulkInsert for NewProductCategory {
    const ENTITY: &'static str = "product-category links";
    const COLUMNS: usize = 2;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(product_categories::table)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)
    }
}

// ============================================================================
// NewCustomer - skip on id conflict
// ============================================================================

impl BulkInsert for NewCustomer {
    const ENTITY: &'static str = "customers";
    const COLUMNS: usize = 1;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(customers::table)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)
    }
}

// ============================================================================
// NewSimilar - skip on (asin, similar_asin) conflict
// ============================================================================

impl BulkInsert for NewSimilar {
    const ENTITY: &'static str = "similarity links";
    const COLUMNS: usize = 2;

    fn bulk_insert(conn: &mut DbConnection, rows: &[Self]) -> QueryResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        diesel::insert_into(similar_products::table)
            .values(rows)
            .on_conflict_do_nothing()
            .execute(conn)
    }
}

// ============================================================================
// NewReview - append-only COPY stream
// ============================================================================

pub const REVIEWS_ENTITY: &str = "reviews";

/// Stream review rows with `COPY reviews (...) FROM STDIN`.
pub fn copy_reviews(conn: &mut DbConnection, rows: &[NewReview]) -> QueryResult<usize> {
    if rows.is_empty() {
        return Ok(0);
    }
    diesel::copy_from(reviews::table)
        .from_insertable(rows)
        .execute(conn)
}
