//! Load pipeline and the store seam it writes through.

pub mod memory;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod store;

// Re-export key types
pub use memory::MemoryStore;
pub use pipeline::{load, LoadError, LoadOptions, LoadStrategy};
pub use report::{FailedProduct, LoadReport};
pub use stage::LoadStage;
pub use store::{Store, StoreError, TableCounts};
