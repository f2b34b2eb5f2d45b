//! Integration tests for the record parser

use std::io::Write;

use amzload::runtime::{parse, parse_file, parse_str, InputEncoding, ParseError};
use amzload::{ProductRecord, SimilarLink};
use chrono::NaiveDate;

const WIDGET_BLOCK: &str = "\
Id: 1
ASIN: B001
title: Widget
group: Tools
salesrank: 500
similar: 2  B002  B003
|Home|Tools|Hardware
2003-1-5 customer: C9  rating: 4  votes: 10  helpful: 8
";

fn blocks(n: usize) -> String {
    (1..=n)
        .map(|i| format!("Id:   {}\nASIN: A{:04}\n  title: Product {}\n  group: Book\n\n", i, i, i))
        .collect()
}

#[test]
fn test_widget_block() {
    let dump = parse_str(WIDGET_BLOCK);

    assert_eq!(
        dump.products,
        vec![ProductRecord {
            id: "1".to_string(),
            asin: Some("B001".to_string()),
            title: Some("Widget".to_string()),
            group: Some("Tools".to_string()),
            salesrank: Some(500),
            categories: vec!["Home".to_string(), "Tools".to_string(), "Hardware".to_string()],
        }]
    );
    assert_eq!(
        dump.similars,
        vec![
            SimilarLink {
                asin: Some("B001".to_string()),
                similar_asin: "B002".to_string()
            },
            SimilarLink {
                asin: Some("B001".to_string()),
                similar_asin: "B003".to_string()
            },
        ]
    );

    assert_eq!(dump.reviews.len(), 1);
    let review = &dump.reviews[0];
    assert_eq!(review.product_id, "1");
    assert_eq!(review.customer_id, "C9");
    assert_eq!(review.date, NaiveDate::from_ymd_opt(2003, 1, 5).unwrap());
    assert_eq!((review.rating, review.votes, review.helpful), (4, 10, 8));

    assert_eq!(dump.customers.iter().collect::<Vec<_>>(), vec!["C9"]);
}

#[test]
fn test_n_blocks_yield_n_products() {
    for n in [0, 1, 2, 17, 250] {
        let dump = parse_str(&blocks(n));
        assert_eq!(dump.products.len(), n, "blocks: {}", n);
        if n > 0 {
            assert_eq!(dump.products[n - 1].id, n.to_string());
        }
    }
}

#[test]
fn test_lines_before_first_id_are_ignored() {
    let input = "\
# Full information about Amazon Share the Love products
Total items: 548552
|Books|Orphan
2000-1-1  customer: X  rating: 5  votes: 0  helpful: 0
Id: 0
ASIN: 0771044445
  discontinued product
";
    let dump = parse_str(input);

    assert_eq!(dump.products.len(), 1);
    assert!(dump.products[0].categories.is_empty());
    assert!(dump.reviews.is_empty());
    assert!(dump.customers.is_empty());
    assert_eq!(dump.stats.orphan_lines, 2);
}

#[test]
fn test_reviews_attach_to_open_block() {
    let input = "\
Id: 10
ASIN: X10
  reviews: total: 2  downloaded: 2  avg rating: 4.5
    2000-7-28  cutomer: A2JW67OY8U6HHK  rating: 5  votes: 10  helpful: 9
Id: 11
ASIN: X11
    2003-12-14  customer: A2JW67OY8U6HHK  rating: 4  votes: 1  helpful: 1
    2004-2-30  customer: BAD  rating: 4  votes: 1  helpful: 1
";
    let dump = parse_str(input);

    let owners: Vec<&str> = dump.reviews.iter().map(|r| r.product_id.as_str()).collect();
    assert_eq!(owners, vec!["10", "11"]);
    assert_eq!(dump.customers.len(), 1);
    assert_eq!(dump.stats.malformed_reviews, 1);
}

#[test]
fn test_parse_file_latin1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"Id: 1\r\nASIN: B1\r\n  title: Caf\xe9 del Mar\r\n").unwrap();
    file.flush().unwrap();

    let dump = parse_file(file.path(), InputEncoding::Utf8).unwrap();
    assert_eq!(dump.products[0].title.as_deref(), Some("Café del Mar"));

    let dump = parse_file(file.path(), InputEncoding::Latin1).unwrap();
    assert_eq!(dump.products[0].asin.as_deref(), Some("B1"));
}

#[test]
fn test_parse_reader_matches_parse_str() {
    let from_reader = parse(WIDGET_BLOCK.as_bytes(), InputEncoding::Utf8).unwrap();
    assert_eq!(from_reader, parse_str(WIDGET_BLOCK));
}

#[test]
fn test_missing_file_is_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("amazon-meta.txt");

    let err = parse_file(&missing, InputEncoding::Utf8).unwrap_err();
    assert!(matches!(err, ParseError::Open { .. }));
    assert!(err.to_string().contains("amazon-meta.txt"));
}
