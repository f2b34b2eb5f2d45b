//! # amzload: Amazon product-metadata dump loader
//!
//! Parses the SNAP Amazon product-metadata dump (one record block per product,
//! with nested category and review lines) and loads it into a normalized
//! PostgreSQL schema with idempotent, deduplicated writes.
//!
//! ## Pipeline
//!
//! ```text
//! input ─▶ runtime::record_parser ─▶ ParsedDump ─▶ loader::pipeline ─▶ Store
//! ```
//!
//! - [`runtime::parse_file`] folds the input line by line into a [`ParsedDump`]
//! - [`loader::load`] writes it in dependency order through a [`loader::Store`]:
//!   [`db::PgStore`] for PostgreSQL or [`loader::MemoryStore`] for dry runs
//!
//! ## Example
//!
//! ```ignore
//! use amzload::loader::{load, LoadOptions, MemoryStore};
//! use amzload::runtime::{parse_file, InputEncoding};
//!
//! let dump = parse_file("amazon-meta.txt", InputEncoding::Utf8)?;
//! let mut store = MemoryStore::new();
//! let report = load(&dump, &mut store, &LoadOptions::default())?;
//! println!("{} products", report.products_written);
//! ```

// Core modules
pub mod entity;
pub mod error;
pub mod extraction;
pub mod serialization;

// Record parser and configuration
pub mod runtime;

// Diesel ORM runtime infrastructure
pub mod diesel_runtime;
pub mod models;
pub mod schema;

// Load pipeline and stores
pub mod loader;

#[cfg(feature = "postgres")]
pub mod db;

// Re-export key types
pub use entity::{Entity, EntityError, ParsedDump, ProductRecord, Review, SimilarLink};
pub use error::AppError;
pub use extraction::{classify, LineKind, ReviewLine, ReviewMatch};
pub use serialization::{NdjsonWriter, SerializationError};

// Re-export runtime types
pub use runtime::{parse, parse_file, parse_str, ConfigError, InputEncoding, LoaderConfig, ParseError};

// Re-export loader types
pub use loader::{load, LoadError, LoadOptions, LoadReport, LoadStage, LoadStrategy, MemoryStore, Store, StoreError};

// Re-export diesel_runtime types
pub use diesel_runtime::DatabaseConfig;

#[cfg(feature = "postgres")]
pub use diesel_runtime::Database;

#[cfg(feature = "postgres")]
pub use db::PgStore;
