//! Parsing runtime: configuration and the line-oriented record parser.

pub mod config_loader;
pub mod record_parser;

// Re-export key types
pub use config_loader::{ConfigError, LoaderConfig};
pub use record_parser::{parse, parse_file, parse_str, InputEncoding, ParseError, RecordParser};
