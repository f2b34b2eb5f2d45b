//! Insertable rows for the normalized schema, built from parsed entities.

use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::{ProductRecord, Review};
use crate::schema::*;

#[derive(Debug, Clone, PartialEq, Eq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = products)]
pub struct NewProduct {
    pub id: String,
    pub asin: Option<String>,
    pub title: String,
    pub product_group: String,
    pub salesrank: Option<i64>,
}

impl From<&ProductRecord> for NewProduct {
    fn from(record: &ProductRecord) -> Self {
        if record.title.is_none() || record.group.is_none() {
            tracing::debug!(
                product_id = %record.id,
                title = record.title.is_none(),
                group = record.group.is_none(),
                "defaulting missing product fields"
            );
        }

        NewProduct {
            id: record.id.clone(),
            asin: record.asin.clone(),
            title: record.title_or_default().to_string(),
            product_group: record.group_or_default().to_string(),
            salesrank: record.salesrank,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = product_categories)]
pub struct NewProductCategory {
    pub product_id: String,
    pub category_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = customers)]
pub struct NewCustomer {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable, Serialize, Deserialize)]
#[diesel(table_name = similar_products)]
pub struct NewSimilar {
    pub asin: String,
    pub similar_asin: String,
}

/// Review row. `COPY` requires every column to be sent explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Insertable, Serialize, Deserialize)]
#[diesel(table_name = reviews)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewReview {
    pub product_id: String,
    pub customer_id: String,
    pub review_date: NaiveDate,
    pub rating: i16,
    pub votes: i32,
    pub helpful: i32,
}

impl From<&Review> for NewReview {
    fn from(review: &Review) -> Self {
        NewReview {
            product_id: review.product_id.clone(),
            customer_id: review.customer_id.clone(),
            review_date: review.date,
            rating: review.rating,
            votes: review.votes,
            helpful: review.helpful,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{UNGROUPED, UNTITLED};

    #[test]
    fn test_new_product_applies_defaults() {
        let record = ProductRecord {
            asin: Some("0771044445".to_string()),
            salesrank: Some(396585),
            ..ProductRecord::new("1")
        };

        let row = NewProduct::from(&record);
        assert_eq!(row.id, "1");
        assert_eq!(row.asin.as_deref(), Some("0771044445"));
        assert_eq!(row.title, UNTITLED);
        assert_eq!(row.product_group, UNGROUPED);
        assert_eq!(row.salesrank, Some(396585));
    }

    #[test]
    fn test_new_review_copies_fields() {
        let review = Review {
            product_id: "2".to_string(),
            customer_id: "A2JW67OY8U6HHK".to_string(),
            date: NaiveDate::from_ymd_opt(2000, 7, 28).unwrap(),
            rating: 5,
            votes: 10,
            helpful: 9,
        };

        let row = NewReview::from(&review);
        assert_eq!(row.review_date, review.date);
        assert_eq!(row.customer_id, "A2JW67OY8U6HHK");
        assert_eq!((row.rating, row.votes, row.helpful), (5, 10, 9));
    }
}
