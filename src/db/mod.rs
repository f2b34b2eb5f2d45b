//! PostgreSQL persistence: model write operations and the pooled [`PgStore`].

pub mod operations;
pub mod pg_store;

pub use operations::copy_reviews;
pub use pg_store::PgStore;
