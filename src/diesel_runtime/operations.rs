//! Set-based write helpers shared by every load stage.

use tracing::debug;

/// PostgreSQL's limit on bind parameters in a single statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Idempotent multi-row insert for one model.
///
/// Implementations insert with "skip on conflict" semantics, never
/// update-on-conflict, and return the number of rows actually inserted.
#[cfg(feature = "postgres")]
pub trait BulkInsert: Sized {
    /// Name used in progress logs
    const ENTITY: &'static str;

    /// Bind parameters per row
    const COLUMNS: usize;

    fn bulk_insert(
        conn: &mut crate::diesel_runtime::DbConnection,
        rows: &[Self],
    ) -> diesel::QueryResult<usize>;
}

/// Largest chunk not exceeding `requested` that keeps one statement under
/// [`MAX_BIND_PARAMS`] for a row of `columns` values.
pub fn effective_chunk_size(requested: usize, columns: usize) -> usize {
    let limit = MAX_BIND_PARAMS / columns.max(1);
    requested.clamp(1, limit.max(1))
}

/// Write `rows` as a sequence of fixed-size chunks, summing affected rows.
///
/// Stops at the first failing chunk.
pub fn write_in_chunks<T, E, F>(
    rows: &[T],
    chunk_size: usize,
    entity: &str,
    mut write: F,
) -> Result<usize, E>
where
    F: FnMut(&[T]) -> Result<usize, E>,
{
    let mut written = 0;
    let mut sent = 0;

    for chunk in rows.chunks(chunk_size.max(1)) {
        written += write(chunk)?;
        sent += chunk.len();
        debug!(entity, sent, total = rows.len(), written, "inserted {} {}", sent, entity);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_chunk_size_respects_bind_limit() {
        assert_eq!(effective_chunk_size(10_000, 5), 10_000);
        assert_eq!(effective_chunk_size(50_000, 5), 13_107);
        assert_eq!(effective_chunk_size(0, 2), 1);
        assert_eq!(effective_chunk_size(100, 0), 100);
    }

    #[test]
    fn test_write_in_chunks_sizes_and_sum() {
        let rows: Vec<u32> = (0..10).collect();
        let mut sizes = Vec::new();

        let written: Result<usize, String> = write_in_chunks(&rows, 4, "numbers", |chunk| {
            sizes.push(chunk.len());
            Ok(chunk.iter().filter(|n| *n % 2 == 0).count())
        });

        assert_eq!(written.unwrap(), 5);
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_write_in_chunks_stops_on_error() {
        let rows = vec![1, 2, 3, 4, 5];
        let mut calls = 0;

        let result = write_in_chunks(&rows, 2, "numbers", |chunk| {
            calls += 1;
            if chunk.contains(&3) {
                Err("boom")
            } else {
                Ok(chunk.len())
            }
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_write_in_chunks_empty_input() {
        let rows: Vec<u8> = Vec::new();
        let result: Result<usize, ()> = write_in_chunks(&rows, 10, "nothing", |_| panic!("not called"));
        assert_eq!(result, Ok(0));
    }
}
