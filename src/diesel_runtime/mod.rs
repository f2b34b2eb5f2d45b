//! Diesel ORM runtime infrastructure
//!
//! This module provides database connection pooling, schema bootstrap and the
//! chunked bulk-write helpers used by the load pipeline.
//!
//! # Features
//!
//! - `postgres`: Diesel PostgreSQL backend, connection pool and `BulkInsert` (default)

pub mod database;
pub mod operations;

// Re-export key types
pub use database::{DatabaseConfig, SCHEMA_SQL};
pub use operations::{effective_chunk_size, write_in_chunks, MAX_BIND_PARAMS};

#[cfg(feature = "postgres")]
pub use database::{ensure_tables, Database, DbConnection, Pool, PooledConnection};
#[cfg(feature = "postgres")]
pub use operations::BulkInsert;
