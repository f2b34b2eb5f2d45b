//! Core entity types produced by the record parser.
//!
//! Every entity here is created once during a single linear pass over the
//! metadata dump and handed to the loader unchanged.

use chrono::NaiveDate;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Title stored for products whose block carries no `title:` line.
pub const UNTITLED: &str = "Untitled";

/// Group stored for products whose block carries no `group:` line.
pub const UNGROUPED: &str = "Ungrouped";

/// Error type for entity operations
#[derive(Debug, Clone, PartialEq)]
pub enum EntityError {
    InvalidFieldValue {
        field: &'static str,
        value: String,
    },
    RequiredFieldMissing {
        field: &'static str,
    },
    OutOfRange {
        field: &'static str,
        value: i64,
    },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::InvalidFieldValue { field, value } => {
                write!(f, "Invalid value for '{}': {:?}", field, value)
            }
            EntityError::RequiredFieldMissing { field } => {
                write!(f, "Required field '{}' is missing or empty", field)
            }
            EntityError::OutOfRange { field, value } => {
                write!(f, "Field '{}' out of range: {}", field, value)
            }
        }
    }
}

impl std::error::Error for EntityError {}

/// Core trait for entities that can be dumped as JSON.
///
/// # Example
///
/// ```ignore
/// use amzload::Entity;
///
/// let line = product.to_ndjson_line()?;
/// ```
pub trait Entity: Serialize + Sized {
    /// The name of this entity type
    const NAME: &'static str;

    /// Convert entity to JSON string
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Convert entity to NDJSON line (newline-delimited JSON)
    fn to_ndjson_line(&self) -> Result<String, serde_json::Error> {
        let json = self.to_json()?;
        Ok(format!("{}\n", json))
    }
}

/// One product block as accumulated by the parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Source id, the token following `Id:`
    pub id: String,
    pub asin: Option<String>,
    pub title: Option<String>,
    pub group: Option<String>,
    pub salesrank: Option<i64>,
    /// Category names in arrival order; may repeat within a block
    #[serde(default)]
    pub categories: Vec<String>,
}

impl ProductRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Category names with in-block repeats removed, first occurrence order kept.
    pub fn distinct_categories(&self) -> IndexSet<&str> {
        self.categories.iter().map(String::as_str).collect()
    }

    /// Title to persist, falling back to [`UNTITLED`].
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    /// Group to persist, falling back to [`UNGROUPED`].
    pub fn group_or_default(&self) -> &str {
        self.group.as_deref().unwrap_or(UNGROUPED)
    }
}

impl Entity for ProductRecord {
    const NAME: &'static str = "Product";
}

/// A review attributed to the product block it was read in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub product_id: String,
    pub customer_id: String,
    pub date: NaiveDate,
    pub rating: i16,
    pub votes: i32,
    pub helpful: i32,
}

impl Entity for Review {
    const NAME: &'static str = "Review";
}

/// Directed similarity pair as declared on a `similar:` line.
///
/// `asin` is absent when the block had no `ASIN:` line before the
/// `similar:` line; such pairs never survive loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimilarLink {
    pub asin: Option<String>,
    pub similar_asin: String,
}

impl Entity for SimilarLink {
    const NAME: &'static str = "SimilarLink";
}

/// Counters collected while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseStats {
    pub lines: usize,
    /// Field, category, similar or review lines seen before any `Id:` line
    pub orphan_lines: usize,
    pub malformed_reviews: usize,
    /// Blocks opened by an `Id:` line with nothing after the prefix
    pub blank_id_blocks: usize,
    pub invalid_salesranks: usize,
}

/// Everything the parser emits for one input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedDump {
    pub products: Vec<ProductRecord>,
    pub reviews: Vec<Review>,
    /// Customer ids in first-seen order
    pub customers: IndexSet<String>,
    pub similars: Vec<SimilarLink>,
    #[serde(default)]
    pub stats: ParseStats,
}

impl ParsedDump {
    pub fn new() -> Self {
        Self::default()
    }
}
