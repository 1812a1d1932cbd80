//! Fixed-size batching of a record stream

use super::record_source::Record;
use crate::error::Result;

/// Ordered group of records processed as one dispatch round
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    /// 0-based round index assigned by the reader
    pub index: u64,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Pulls at most `batch_size` records per call
#[derive(Debug)]
pub struct BatchReader {
    batch_size: usize,
    next_index: u64,
}

impl BatchReader {
    /// `batch_size` must be positive; configuration validation enforces this
    pub fn new(batch_size: usize) -> Self {
        debug_assert!(batch_size > 0, "batch_size must be positive");
        Self {
            batch_size: batch_size.max(1),
            next_index: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Read the next batch. An empty batch means the source is exhausted.
    pub fn read_batch<I>(&mut self, source: &mut I) -> Result<Batch>
    where
        I: Iterator<Item = Result<Record>>,
    {
        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match source.next() {
                Some(record) => records.push(record?),
                None => break,
            }
        }

        let index = self.next_index;
        if !records.is_empty() {
            self.next_index += 1;
        }
        Ok(Batch { index, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, ErrorCode};
    use crate::source::RecordSource;
    use std::io::Cursor;

    fn records(n: usize) -> impl Iterator<Item = Result<Record>> {
        (0..n).map(|i| Ok(format!("r{}", i)))
    }

    #[test]
    fn test_exact_multiple() {
        let mut reader = BatchReader::new(2);
        let mut src = records(4);
        assert_eq!(reader.read_batch(&mut src).unwrap().len(), 2);
        assert_eq!(reader.read_batch(&mut src).unwrap().len(), 2);
        assert!(reader.read_batch(&mut src).unwrap().is_empty());
    }

    #[test]
    fn test_remainder_and_indexes() {
        let mut reader = BatchReader::new(3);
        let mut src = records(5);
        let first = reader.read_batch(&mut src).unwrap();
        let second = reader.read_batch(&mut src).unwrap();
        let end = reader.read_batch(&mut src).unwrap();

        assert_eq!(first.index, 0);
        assert_eq!(first.records, vec!["r0", "r1", "r2"]);
        assert_eq!(second.index, 1);
        assert_eq!(second.records, vec!["r3", "r4"]);
        assert!(end.is_empty());
        assert_eq!(end.index, 2);
    }

    #[test]
    fn test_blank_lines_do_not_end_batch_early() {
        let mut src = RecordSource::from_reader(Cursor::new("a\n\n\nb\n\nc\n"), "memory");
        let mut reader = BatchReader::new(2);
        let batch = reader.read_batch(&mut src).unwrap();
        assert_eq!(batch.records, vec!["a", "b"]);
        let batch = reader.read_batch(&mut src).unwrap();
        assert_eq!(batch.records, vec!["c"]);
    }

    #[test]
    fn test_boundaries_are_deterministic() {
        let collect = || {
            let mut reader = BatchReader::new(4);
            let mut src = records(10);
            let mut out = Vec::new();
            loop {
                let batch = reader.read_batch(&mut src).unwrap();
                if batch.is_empty() {
                    break;
                }
                out.push(batch);
            }
            out
        };
        assert_eq!(collect(), collect());
    }

    #[test]
    fn test_read_error_propagates() {
        let mut src = vec![
            Ok("a".to_string()),
            Err(EngineError::source_read(ErrorCode::SOURCE_READ_FAILED, "disk", 2)),
        ]
        .into_iter();
        let mut reader = BatchReader::new(10);
        let err = reader.read_batch(&mut src).unwrap_err();
        assert_eq!(err.code(), ErrorCode::SOURCE_READ_FAILED);
    }
}
