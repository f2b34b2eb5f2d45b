//! The write seam between the load pipeline and a relational backend.

use std::collections::{HashMap, HashSet};
use std::fmt;

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{NewCategory, NewCustomer, NewProduct, NewProductCategory, NewReview, NewSimilar};

/// Error type for store operations
#[derive(Debug)]
pub enum StoreError {
    Database(DieselError),
    Pool(r2d2::Error),
    Connection(diesel::ConnectionError),
    /// Constraint violation detected outside the database
    Rejected(String),
}

impl StoreError {
    /// Whether the failure is confined to the rows involved, so a per-product
    /// pass may roll back that product and carry on.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::Rejected(_) => true,
            StoreError::Database(DieselError::DatabaseError(kind, _)) => {
                !matches!(kind, DatabaseErrorKind::ClosedConnection)
            }
            _ => false,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::Pool(e) => write!(f, "Connection pool error: {}", e),
            StoreError::Connection(e) => write!(f, "Connection error: {}", e),
            StoreError::Rejected(msg) => write!(f, "Rejected write: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Pool(e) => Some(e),
            StoreError::Connection(e) => Some(e),
            StoreError::Rejected(_) => None,
        }
    }
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        StoreError::Database(err)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Pool(err)
    }
}

impl From<diesel::ConnectionError> for StoreError {
    fn from(err: diesel::ConnectionError) -> Self {
        StoreError::Connection(err)
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub products: usize,
    pub categories: usize,
    pub product_categories: usize,
    pub customers: usize,
    pub similar_products: usize,
    pub reviews: usize,
}

/// Relational backend the loader writes into.
///
/// Every `insert_*` skips rows whose key already exists and returns the number
/// of rows actually inserted. `copy_reviews` is append-only.
pub trait Store {
    fn insert_products(&mut self, rows: &[NewProduct]) -> Result<usize, StoreError>;

    fn insert_categories(&mut self, rows: &[NewCategory]) -> Result<usize, StoreError>;

    /// Ids of the named categories that exist.
    fn category_ids(&mut self, names: &[String]) -> Result<HashMap<String, i32>, StoreError>;

    fn insert_product_categories(&mut self, rows: &[NewProductCategory]) -> Result<usize, StoreError>;

    fn insert_customers(&mut self, rows: &[NewCustomer]) -> Result<usize, StoreError>;

    /// Trimmed, non-null ASINs of every stored product.
    fn known_asins(&mut self) -> Result<HashSet<String>, StoreError>;

    fn insert_similars(&mut self, rows: &[NewSimilar]) -> Result<usize, StoreError>;

    fn copy_reviews(&mut self, rows: &[NewReview]) -> Result<usize, StoreError>;

    fn table_counts(&mut self) -> Result<TableCounts, StoreError>;

    /// Open a unit of work: a transaction, or a savepoint when one is open.
    fn begin_unit(&mut self) -> Result<(), StoreError>;

    fn commit_unit(&mut self) -> Result<(), StoreError>;

    fn rollback_unit(&mut self) -> Result<(), StoreError>;

    /// Run `f` as one unit of work, rolling it back if `f` fails.
    fn atomically<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        self.begin_unit()?;
        match f(self) {
            Ok(value) => {
                self.commit_unit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.rollback_unit() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors() {
        assert!(StoreError::Rejected("fk".to_string()).is_recoverable());

        let unique = StoreError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        ));
        assert!(unique.is_recoverable());

        let closed = StoreError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("server closed the connection".to_string()),
        ));
        assert!(!closed.is_recoverable());

        assert!(!StoreError::Database(DieselError::NotFound).is_recoverable());
    }
}
