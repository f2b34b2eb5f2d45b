//! Line classification and review-line extraction.
//!
//! Lines of the metadata dump are dispatched by an ordered set of prefix
//! matchers; anything that matches none of them falls through to the review
//! grammar.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

use crate::entity::EntityError;

/// Full review grammar, case-insensitive and not anchored to line start.
static REVIEW_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(\d{4})-(\d{1,2})-(\d{1,2})\s+(?:cutomer|customer):\s*(\S+)\s+rating:\s*(\d+)\s+votes:\s*(\d+)\s+helpful:\s*(\d+)",
    )
    .expect("review pattern is valid")
});

/// Marks a line as an attempted review even when the full grammar fails.
static CUSTOMER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:cutomer|customer):").expect("customer marker is valid"));

/// Kind of a single trimmed input line, with the text after its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    Id(&'a str),
    Asin(&'a str),
    Title(&'a str),
    Group(&'a str),
    SalesRank(&'a str),
    Similar(&'a str),
    /// Pipe-delimited category path, including the leading `|`
    Categories(&'a str),
    Other(&'a str),
}

fn after<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(str::trim)
}

/// Classify a line. Prefix tests are case-sensitive and run on the trimmed line.
pub fn classify(line: &str) -> LineKind<'_> {
    let line = line.trim();

    if let Some(rest) = after(line, "Id:") {
        LineKind::Id(rest)
    } else if let Some(rest) = after(line, "ASIN:") {
        LineKind::Asin(rest)
    } else if let Some(rest) = after(line, "title:") {
        LineKind::Title(rest)
    } else if let Some(rest) = after(line, "group:") {
        LineKind::Group(rest)
    } else if let Some(rest) = after(line, "salesrank:") {
        LineKind::SalesRank(rest)
    } else if let Some(rest) = after(line, "similar:") {
        LineKind::Similar(rest)
    } else if line.starts_with('|') {
        LineKind::Categories(line)
    } else {
        LineKind::Other(line)
    }
}

/// Split a `|`-delimited category line into trimmed, non-blank names.
pub fn split_categories(line: &str) -> impl Iterator<Item = &str> {
    line.split('|').map(str::trim).filter(|c| !c.is_empty())
}

/// ASINs listed on a `similar:` line.
///
/// `rest` is the text after the `similar:` prefix; its first token is the
/// declared count, which is skipped.
pub fn similar_asins(rest: &str) -> impl Iterator<Item = &str> {
    rest.split_whitespace().skip(1)
}

/// The five fields extracted from a review line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLine {
    pub date: NaiveDate,
    pub customer_id: String,
    pub rating: i16,
    pub votes: i32,
    pub helpful: i32,
}

/// Outcome of running the review grammar against a line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewMatch {
    /// No customer marker: the line is not a review at all
    NotAReview,
    Review(ReviewLine),
    /// The line looks like a review but failed full extraction
    Malformed(EntityError),
}

impl ReviewLine {
    /// Run the review grammar against a line.
    pub fn extract(line: &str) -> ReviewMatch {
        let caps = match REVIEW_PATTERN.captures(line) {
            Some(caps) => caps,
            None if CUSTOMER_MARKER.is_match(line) => {
                return ReviewMatch::Malformed(EntityError::InvalidFieldValue {
                    field: "review",
                    value: line.to_string(),
                });
            }
            None => return ReviewMatch::NotAReview,
        };

        let field = |idx: usize| caps.get(idx).map(|m| m.as_str()).unwrap_or_default();

        match Self::from_fields(
            (field(1), field(2), field(3)),
            field(4),
            field(5),
            field(6),
            field(7),
        ) {
            Ok(review) => ReviewMatch::Review(review),
            Err(err) => ReviewMatch::Malformed(err),
        }
    }

    fn from_fields(
        (year, month, day): (&str, &str, &str),
        customer_id: &str,
        rating: &str,
        votes: &str,
        helpful: &str,
    ) -> Result<Self, EntityError> {
        let date = parse_date(year, month, day)?;

        let rating: i64 = parse_int("rating", rating)?;
        if !(0..=5).contains(&rating) {
            return Err(EntityError::OutOfRange {
                field: "rating",
                value: rating,
            });
        }

        Ok(Self {
            date,
            customer_id: customer_id.to_string(),
            rating: rating as i16,
            votes: parse_int("votes", votes)?,
            helpful: parse_int("helpful", helpful)?,
        })
    }
}

fn parse_int<T: FromStr>(field: &'static str, raw: &str) -> Result<T, EntityError> {
    raw.parse().map_err(|_| EntityError::InvalidFieldValue {
        field,
        value: raw.to_string(),
    })
}

fn parse_date(year: &str, month: &str, day: &str) -> Result<NaiveDate, EntityError> {
    let invalid = || EntityError::InvalidFieldValue {
        field: "date",
        value: format!("{}-{}-{}", year, month, day),
    };

    let y: i32 = year.parse().map_err(|_| invalid())?;
    let m: u32 = month.parse().map_err(|_| invalid())?;
    let d: u32 = day.parse().map_err(|_| invalid())?;

    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(invalid)
}

impl fmt::Display for ReviewLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  customer: {}  rating: {}  votes: {}  helpful: {}",
            self.date.format("%Y-%-m-%-d"),
            self.customer_id,
            self.rating,
            self.votes,
            self.helpful
        )
    }
}

impl FromStr for ReviewLine {
    type Err = EntityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::extract(s) {
            ReviewMatch::Review(review) => Ok(review),
            ReviewMatch::Malformed(err) => Err(err),
            ReviewMatch::NotAReview => Err(EntityError::RequiredFieldMissing { field: "customer" }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_prefixes() {
        assert_eq!(classify("Id:   15"), LineKind::Id("15"));
        assert_eq!(classify("ASIN: 0827229534"), LineKind::Asin("0827229534"));
        assert_eq!(
            classify("  title: Patterns of Preaching"),
            LineKind::Title("Patterns of Preaching")
        );
        assert_eq!(classify("  group: Book"), LineKind::Group("Book"));
        assert_eq!(classify("  salesrank: 396585"), LineKind::SalesRank("396585"));
        assert_eq!(
            classify("  similar: 2  B002  B003"),
            LineKind::Similar("2  B002  B003")
        );
        assert_eq!(
            classify("   |Books[283155]|Subjects[1000]"),
            LineKind::Categories("|Books[283155]|Subjects[1000]")
        );
        assert_eq!(classify("  categories: 2"), LineKind::Other("categories: 2"));
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(classify("id: 3"), LineKind::Other("id: 3"));
        assert_eq!(classify("Title: X"), LineKind::Other("Title: X"));
    }

    #[test]
    fn test_split_categories_drops_blanks() {
        let names: Vec<&str> = split_categories("|Home| Tools ||Hardware|").collect();
        assert_eq!(names, vec!["Home", "Tools", "Hardware"]);
    }

    #[test]
    fn test_similar_asins_skip_count() {
        let asins: Vec<&str> = similar_asins("5  0804215715  156101074X  0687023955").collect();
        assert_eq!(asins, vec!["0804215715", "156101074X", "0687023955"]);
        assert_eq!(similar_asins("0").count(), 0);
    }

    #[test]
    fn test_extract_review() {
        let line = "    2000-7-28  cutomer: A2JW67OY8U6HHK  rating: 5  votes:  10  helpful:   9";
        let review = match ReviewLine::extract(line) {
            ReviewMatch::Review(r) => r,
            other => panic!("unexpected {:?}", other),
        };

        assert_eq!(review.date, NaiveDate::from_ymd_opt(2000, 7, 28).unwrap());
        assert_eq!(review.customer_id, "A2JW67OY8U6HHK");
        assert_eq!(review.rating, 5);
        assert_eq!(review.votes, 10);
        assert_eq!(review.helpful, 9);
    }

    #[test]
    fn test_extract_review_case_insensitive_marker() {
        let line = "2003-12-05 CUSTOMER: C9 Rating: 4 VOTES: 1 helpful: 0";
        assert!(matches!(ReviewLine::extract(line), ReviewMatch::Review(_)));
    }

    #[test]
    fn test_extract_non_review_line() {
        assert_eq!(
            ReviewLine::extract("reviews: total: 2  downloaded: 2  avg rating: 5"),
            ReviewMatch::NotAReview
        );
        assert_eq!(ReviewLine::extract("discontinued product"), ReviewMatch::NotAReview);
    }

    #[test]
    fn test_extract_malformed_reviews() {
        // Impossible calendar date
        assert!(matches!(
            ReviewLine::extract("2001-13-40  customer: X  rating: 5  votes: 1  helpful: 1"),
            ReviewMatch::Malformed(EntityError::InvalidFieldValue { field: "date", .. })
        ));
        // Non-integer field
        assert!(matches!(
            ReviewLine::extract("2001-1-4  customer: X  rating: five  votes: 1  helpful: 1"),
            ReviewMatch::Malformed(_)
        ));
        // Rating out of range
        assert!(matches!(
            ReviewLine::extract("2001-1-4  customer: X  rating: 9  votes: 1  helpful: 1"),
            ReviewMatch::Malformed(EntityError::OutOfRange { field: "rating", value: 9 })
        ));
        // Overflowing vote count
        assert!(matches!(
            ReviewLine::extract("2001-1-4  customer: X  rating: 1  votes: 99999999999  helpful: 1"),
            ReviewMatch::Malformed(EntityError::InvalidFieldValue { field: "votes", .. })
        ));
    }

    #[test]
    fn test_review_line_reserializes_to_same_fields() {
        let original = "2003-1-5 customer: C9  rating: 4  votes: 10  helpful: 8";
        let parsed: ReviewLine = original.parse().unwrap();

        let reparsed: ReviewLine = parsed.to_string().parse().unwrap();
        assert_eq!(parsed, reparsed);
        assert_eq!(
            parsed.to_string(),
            "2003-1-5  customer: C9  rating: 4  votes: 10  helpful: 8"
        );
    }
}
