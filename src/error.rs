//! Top-level error for the `amzload` binary and its exit statuses.

use std::fmt;

use crate::loader::{LoadError, StoreError};
use crate::runtime::{ConfigError, ParseError};
use crate::serialization::SerializationError;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Parse(ParseError),
    Store(StoreError),
    Load(LoadError),
    Output(SerializationError),
}

impl AppError {
    /// Process exit status: 1 configuration or usage, 2 unreadable input,
    /// 3 database or load-stage failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) | AppError::Output(_) => 1,
            AppError::Parse(_) => 2,
            AppError::Store(_) | AppError::Load(_) => 3,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Parse(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::Load(e) => write!(f, "{}", e),
            AppError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        AppError::Parse(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::Load(err)
    }
}

impl From<SerializationError> for AppError {
    fn from(err: SerializationError) -> Self {
        AppError::Output(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadStage;

    #[test]
    fn test_exit_codes() {
        let config = AppError::from(ConfigError::Invalid("chunk_size".to_string()));
        let parse = AppError::from(ParseError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "truncated",
        )));
        let load = AppError::from(LoadError {
            stage: LoadStage::WritingProducts,
            source: StoreError::Rejected("fk".to_string()),
        });

        assert_eq!(config.exit_code(), 1);
        assert_eq!(parse.exit_code(), 2);
        assert_eq!(load.exit_code(), 3);
        assert_eq!(AppError::from(StoreError::Rejected("x".to_string())).exit_code(), 3);
    }
}
