//! Per-level row buffer
//!
//! One fixed-size region per tree level that the cursor overwrites with the
//! engine's native row image on every fetched row. Buffers are allocated
//! once and reused for the whole query.

use std::sync::Arc;

use crate::engine::Record;

/// Level flag: rows of this level only link parent and child
pub const FLAG_JOIN_TABLE: u16 = 0x2;

/// Row image destination for one level
#[derive(Debug, Clone, Default)]
pub struct RowBuffer {
    record: Option<Arc<Record>>,
    data: Vec<u8>,
    flags: u16,
    /// Index of the most recent non-null header pushed for this level
    last_copy: Option<usize>,
}

impl RowBuffer {
    /// Placeholder for a level that has no record bound yet
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Buffer sized to `record`'s row image, zero filled
    pub fn new(record: Arc<Record>) -> Self {
        let data = vec![0u8; record.row_size()];
        Self {
            record: Some(record),
            data,
            flags: 0,
            last_copy: None,
        }
    }

    pub fn record(&self) -> Option<&Arc<Record>> {
        self.record.as_ref()
    }

    /// Row image size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Destination for the cursor's row image
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy `row` into the buffer, truncating or zero padding to its size.
    pub fn fill(&mut self, row: &[u8]) {
        let n = row.len().min(self.data.len());
        self.data[..n].copy_from_slice(&row[..n]);
        self.data[n..].fill(0);
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn mark_join_only(&mut self) {
        self.flags |= FLAG_JOIN_TABLE;
    }

    pub fn is_join_only(&self) -> bool {
        self.flags & FLAG_JOIN_TABLE != 0
    }

    pub fn is_bound(&self) -> bool {
        self.record.is_some()
    }

    pub(crate) fn last_copy(&self) -> Option<usize> {
        self.last_copy
    }

    pub(crate) fn set_last_copy(&mut self, index: usize) {
        self.last_copy = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_sized_to_record() {
        let buffer = RowBuffer::new(Arc::new(Record::packed([("id", 4), ("name", 12)])));
        assert_eq!(buffer.size(), 16);
        assert!(buffer.is_bound());
        assert!(buffer.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_unbound_buffer_is_empty() {
        let buffer = RowBuffer::unbound();
        assert_eq!(buffer.size(), 0);
        assert!(!buffer.is_bound());
    }

    #[test]
    fn test_fill_pads_and_truncates() {
        let mut buffer = RowBuffer::new(Arc::new(Record::packed([("v", 4)])));
        buffer.fill(&[1, 2]);
        assert_eq!(buffer.as_slice(), &[1, 2, 0, 0]);
        buffer.fill(&[9, 9, 9, 9, 9, 9]);
        assert_eq!(buffer.as_slice(), &[9, 9, 9, 9]);
    }

    #[test]
    fn test_join_only_flag() {
        let mut buffer = RowBuffer::new(Arc::new(Record::packed([("v", 1)])));
        assert!(!buffer.is_join_only());
        buffer.mark_join_only();
        assert!(buffer.is_join_only());
        assert_eq!(buffer.flags(), FLAG_JOIN_TABLE);
    }
}
