//! Line-oriented record parser for the product-metadata dump.
//!
//! The parser is a fold: [`RecordParser`] is the accumulator holding exactly
//! one open product block plus the output collections, [`RecordParser::feed_line`]
//! is the step function and [`RecordParser::finish`] flushes the last block.
//!
//! # Example Flow
//! 1. `Id:` line → flush the open block (if any), open a new one
//! 2. field / category / similar lines → update the open block
//! 3. anything else → review grammar, attributed to the open block
//! 4. end of input → flush the open block

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entity::{EntityError, ParsedDump, ProductRecord, Review, SimilarLink};
use crate::extraction::{classify, similar_asins, split_categories, LineKind, ReviewLine, ReviewMatch};

const READ_BUFFER_BYTES: usize = 1 << 20;

/// Character encoding of the input dump.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputEncoding {
    /// UTF-8; lines that are not valid UTF-8 are decoded as Latin-1
    #[default]
    Utf8,
    Latin1,
}

impl InputEncoding {
    /// Decode one raw line, dropping the trailing line terminator.
    pub fn decode(self, raw: &[u8]) -> String {
        let raw = trim_line_end(raw);
        match self {
            InputEncoding::Utf8 => match std::str::from_utf8(raw) {
                Ok(text) => text.to_string(),
                Err(err) => {
                    debug!(error = %err, "line is not valid UTF-8, decoding as Latin-1");
                    latin1(raw)
                }
            },
            InputEncoding::Latin1 => latin1(raw),
        }
    }
}

impl FromStr for InputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(InputEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(InputEncoding::Latin1),
            other => Err(format!("unknown encoding '{}' (expected utf8 or latin1)", other)),
        }
    }
}

fn trim_line_end(raw: &[u8]) -> &[u8] {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    raw.strip_suffix(b"\r").unwrap_or(raw)
}

fn latin1(raw: &[u8]) -> String {
    raw.iter().map(|&b| b as char).collect()
}

/// Error type for reading the input dump
#[derive(Debug)]
pub enum ParseError {
    Io(io::Error),
    Open { path: PathBuf, source: io::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "Failed to read input: {}", e),
            ParseError::Open { path, source } => {
                write!(f, "Failed to open input {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            ParseError::Open { source, .. } => Some(source),
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        ParseError::Io(err)
    }
}

/// Fold accumulator: one open product block plus everything emitted so far.
#[derive(Debug, Default)]
pub struct RecordParser {
    current: Option<ProductRecord>,
    dump: ParsedDump,
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line of input.
    pub fn feed_line(&mut self, line: &str) {
        self.dump.stats.lines += 1;
        let line_no = self.dump.stats.lines;

        match classify(line) {
            LineKind::Id(id) => self.open_block(id, line_no),
            LineKind::Other(text) => self.review_line(text, line_no),
            field => self.field_line(field, line_no),
        }
    }

    /// Flush the open block and return the collected output.
    pub fn finish(mut self) -> ParsedDump {
        self.flush();
        self.dump
    }

    fn open_block(&mut self, id: &str, line_no: usize) {
        self.flush();

        if id.is_empty() {
            let err = EntityError::RequiredFieldMissing { field: "Id" };
            warn!(line = line_no, error = %err, "block without identifier will be dropped");
            self.dump.stats.blank_id_blocks += 1;
        }

        self.current = Some(ProductRecord::new(id));
    }

    fn flush(&mut self) {
        if let Some(product) = self.current.take() {
            if !product.id.is_empty() {
                self.dump.products.push(product);
            }
        }
    }

    fn field_line(&mut self, kind: LineKind<'_>, line_no: usize) {
        let Some(product) = self.current.as_mut() else {
            self.dump.stats.orphan_lines += 1;
            return;
        };

        match kind {
            LineKind::Asin(value) => product.asin = non_blank(value),
            LineKind::Title(value) => product.title = non_blank(value),
            LineKind::Group(value) => product.group = non_blank(value),
            LineKind::SalesRank(value) => {
                product.salesrank = value.parse().ok();
                if product.salesrank.is_none() && !value.is_empty() {
                    debug!(line = line_no, product_id = %product.id, value, "invalid salesrank stored as absent");
                    self.dump.stats.invalid_salesranks += 1;
                }
            }
            LineKind::Similar(rest) => {
                let asin = product.asin.clone();
                self.dump.similars.extend(similar_asins(rest).map(|similar| SimilarLink {
                    asin: asin.clone(),
                    similar_asin: similar.to_string(),
                }));
            }
            LineKind::Categories(text) => {
                product.categories.extend(split_categories(text).map(String::from));
            }
            LineKind::Id(_) | LineKind::Other(_) => {}
        }
    }

    fn review_line(&mut self, text: &str, line_no: usize) {
        let outcome = ReviewLine::extract(text);
        if outcome == ReviewMatch::NotAReview {
            return;
        }

        let product_id = match self.current.as_ref() {
            Some(product) if !product.id.is_empty() => product.id.clone(),
            _ => {
                self.dump.stats.orphan_lines += 1;
                return;
            }
        };

        match outcome {
            ReviewMatch::Review(review) => {
                if !self.dump.customers.contains(&review.customer_id) {
                    self.dump.customers.insert(review.customer_id.clone());
                }
                self.dump.reviews.push(Review {
                    product_id,
                    customer_id: review.customer_id,
                    date: review.date,
                    rating: review.rating,
                    votes: review.votes,
                    helpful: review.helpful,
                });
            }
            ReviewMatch::Malformed(err) => {
                warn!(line = line_no, %product_id, error = %err, "dropping review line: {}", text);
                self.dump.stats.malformed_reviews += 1;
            }
            ReviewMatch::NotAReview => {}
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse an in-memory dump. Lines are taken as already decoded.
pub fn parse_str(text: &str) -> ParsedDump {
    text.lines()
        .fold(RecordParser::new(), |mut parser, line| {
            parser.feed_line(line);
            parser
        })
        .finish()
}

/// Parse a dump from any buffered reader.
pub fn parse<R: BufRead>(reader: R, encoding: InputEncoding) -> Result<ParsedDump, ParseError> {
    decoded_lines(reader, encoding)
        .try_fold(RecordParser::new(), |mut parser, line| -> Result<_, ParseError> {
            parser.feed_line(&line?);
            Ok(parser)
        })
        .map(RecordParser::finish)
}

/// Parse a dump file from disk.
pub fn parse_file<P: AsRef<Path>>(path: P, encoding: InputEncoding) -> Result<ParsedDump, ParseError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), ?encoding, "reading input");
    let dump = parse(BufReader::with_capacity(READ_BUFFER_BYTES, file), encoding)?;

    info!(
        products = dump.products.len(),
        reviews = dump.reviews.len(),
        customers = dump.customers.len(),
        similars = dump.similars.len(),
        malformed_reviews = dump.stats.malformed_reviews,
        orphan_lines = dump.stats.orphan_lines,
        "parsed {} lines",
        dump.stats.lines
    );
    Ok(dump)
}

fn decoded_lines<R: BufRead>(
    mut reader: R,
    encoding: InputEncoding,
) -> impl Iterator<Item = io::Result<String>> {
    let mut buf = Vec::new();
    std::iter::from_fn(move || {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => None,
            Ok(_) => Some(Ok(encoding.decode(&buf))),
            Err(e) => Some(Err(e)),
        }
    })
}
