//! Load state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a load run. Stages run strictly in this order and each one
/// commits before the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStage {
    Pending,
    WritingProducts,
    WritingCategories,
    WritingLinks,
    WritingCustomers,
    WritingSimilars,
    WritingReviews,
    Done,
}

impl LoadStage {
    /// Stage that follows this one, `None` once done.
    pub fn next(self) -> Option<LoadStage> {
        use LoadStage::*;
        match self {
            Pending => Some(WritingProducts),
            WritingProducts => Some(WritingCategories),
            WritingCategories => Some(WritingLinks),
            WritingLinks => Some(WritingCustomers),
            WritingCustomers => Some(WritingSimilars),
            WritingSimilars => Some(WritingReviews),
            WritingReviews => Some(Done),
            Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadStage::Pending => "pending",
            LoadStage::WritingProducts => "writing_products",
            LoadStage::WritingCategories => "writing_categories",
            LoadStage::WritingLinks => "writing_links",
            LoadStage::WritingCustomers => "writing_customers",
            LoadStage::WritingSimilars => "writing_similars",
            LoadStage::WritingReviews => "writing_reviews",
            LoadStage::Done => "done",
        }
    }

    pub fn is_done(self) -> bool {
        self == LoadStage::Done
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stages = vec![LoadStage::Pending];
        while let Some(next) = stages.last().and_then(|s| s.next()) {
            stages.push(next);
        }

        assert_eq!(
            stages,
            vec![
                LoadStage::Pending,
                LoadStage::WritingProducts,
                LoadStage::WritingCategories,
                LoadStage::WritingLinks,
                LoadStage::WritingCustomers,
                LoadStage::WritingSimilars,
                LoadStage::WritingReviews,
                LoadStage::Done,
            ]
        );
        assert!(stages.last().unwrap().is_done());
    }

    #[test]
    fn test_stage_serializes_as_snake_case() {
        let json = serde_json::to_string(&LoadStage::WritingLinks).unwrap();
        assert_eq!(json, "\"writing_links\"");
        assert_eq!(LoadStage::WritingLinks.to_string(), "writing_links");
    }
}
