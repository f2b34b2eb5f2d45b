//! NDJSON output for parsed entities.
//!
//! Each line is a tagged object: `{"entity_type": "Product", "data": {...}}`.

use serde::Serialize;
use std::io::Write;

use crate::entity::{Entity, ParsedDump};

/// Error type for serialization operations
#[derive(Debug)]
pub enum SerializationError {
    JsonError(serde_json::Error),
    IoError(std::io::Error),
}

impl From<serde_json::Error> for SerializationError {
    fn from(err: serde_json::Error) -> Self {
        SerializationError::JsonError(err)
    }
}

impl From<std::io::Error> for SerializationError {
    fn from(err: std::io::Error) -> Self {
        SerializationError::IoError(err)
    }
}

impl std::fmt::Display for SerializationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializationError::JsonError(e) => write!(f, "JSON error: {}", e),
            SerializationError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for SerializationError {}

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    entity_type: &'static str,
    data: &'a T,
}

#[derive(Serialize)]
struct Customer<'a> {
    id: &'a str,
}

impl Entity for Customer<'_> {
    const NAME: &'static str = "Customer";
}

/// Lines written per entity type by [`NdjsonWriter::write_dump`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DumpCounts {
    pub products: usize,
    pub customers: usize,
    pub similars: usize,
    pub reviews: usize,
}

/// NDJSON (Newline Delimited JSON) writer
///
/// Writes entities as NDJSON, one JSON object per line.
pub struct NdjsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> NdjsonWriter<W> {
    /// Create a new NDJSON writer
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write any serializable value as one line
    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<(), SerializationError> {
        let json = serde_json::to_string(value)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    /// Write an entity wrapped with its type name
    pub fn write_entity<T: Entity>(&mut self, entity: &T) -> Result<(), SerializationError> {
        self.write(&Tagged {
            entity_type: T::NAME,
            data: entity,
        })
    }

    /// Write multiple entities
    pub fn write_all<T: Entity>(&mut self, entities: &[T]) -> Result<usize, SerializationError> {
        for entity in entities {
            self.write_entity(entity)?;
        }
        Ok(entities.len())
    }

    /// Write every entity of a parsed dump: products, customers, similarity
    /// links, then reviews.
    pub fn write_dump(&mut self, dump: &ParsedDump) -> Result<DumpCounts, SerializationError> {
        let products = self.write_all(&dump.products)?;
        for id in &dump.customers {
            self.write_entity(&Customer { id: id.as_str() })?;
        }
        let similars = self.write_all(&dump.similars)?;
        let reviews = self.write_all(&dump.reviews)?;
        self.flush()?;

        Ok(DumpCounts {
            products,
            customers: dump.customers.len(),
            similars,
            reviews,
        })
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> Result<(), SerializationError> {
        self.writer.flush()?;
        Ok(())
    }
}
