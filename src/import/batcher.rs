//! Fixed-ceiling record batching

use crate::schema::{WriteRecord, MAX_RECORDS_PER_WRITE};

/// Collects records into batches of at most `capacity`.
#[derive(Debug)]
pub struct RecordBatcher {
    capacity: usize,
    pending: Vec<WriteRecord>,
}

impl Default for RecordBatcher {
    fn default() -> Self {
        Self::new(MAX_RECORDS_PER_WRITE)
    }
}

impl RecordBatcher {
    /// `capacity` is clamped to `1..=MAX_RECORDS_PER_WRITE`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_RECORDS_PER_WRITE);
        Self {
            capacity,
            pending: Vec::with_capacity(capacity),
        }
    }

    /// Add a record; returns a full batch once the ceiling is reached.
    pub fn push(&mut self, record: WriteRecord) -> Option<Vec<WriteRecord>> {
        self.pending.push(record);
        if self.pending.len() >= self.capacity {
            Some(std::mem::replace(
                &mut self.pending,
                Vec::with_capacity(self.capacity),
            ))
        } else {
            None
        }
    }

    /// Remaining records, if any.
    pub fn finish(&mut self) -> Option<Vec<WriteRecord>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batches_never_exceed_ceiling() {
        let mut batcher = RecordBatcher::default();
        let mut sizes = Vec::new();
        for _ in 0..250 {
            if let Some(batch) = batcher.push(WriteRecord::default()) {
                sizes.push(batch.len());
            }
        }
        if let Some(batch) = batcher.finish() {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![100, 100, 50]);
        assert!(batcher.finish().is_none());
    }

    #[test]
    fn test_exact_multiple_has_no_remainder() {
        let mut batcher = RecordBatcher::new(2);
        assert!(batcher.push(WriteRecord::default()).is_none());
        assert_eq!(batcher.pending(), 1);
        assert_eq!(batcher.push(WriteRecord::default()).unwrap().len(), 2);
        assert!(batcher.finish().is_none());
    }

    #[test]
    fn test_capacity_is_clamped() {
        let mut batcher = RecordBatcher::new(1_000);
        for _ in 0..99 {
            assert!(batcher.push(WriteRecord::default()).is_none());
        }
        assert!(batcher.push(WriteRecord::default()).is_some());
        assert_eq!(RecordBatcher::new(0).capacity, 1);
    }
}
