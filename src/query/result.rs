//! Result header store
//!
//! Headers are kept in discovery order and never reordered. Capacity starts
//! at a fixed allocation and doubles when full; it never shrinks for the
//! lifetime of the store.

use std::mem;

use super::buffer::FLAG_JOIN_TABLE;
use super::errors::{QueryError, QueryResult};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Tag bit: the row is NULL and carries no data
pub const TAG_NULL: u16 = 0x1;

/// Header slots allocated before the first doubling
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// One fetched row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultHeader {
    depth: u16,
    tag: u16,
    data: Option<Box<[u8]>>,
}

impl ResultHeader {
    /// Tree level that produced the row
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// NULL bit plus level flags
    pub fn tag(&self) -> u16 {
        self.tag
    }

    pub fn is_null(&self) -> bool {
        self.tag & TAG_NULL != 0
    }

    /// Level flags without the NULL bit
    pub fn flags(&self) -> u16 {
        self.tag & !TAG_NULL
    }

    pub fn is_join_only(&self) -> bool {
        self.tag & FLAG_JOIN_TABLE != 0
    }

    /// Row bytes; `None` for NULL rows and rows whose data was taken
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

/// Growable array of result headers
#[derive(Debug)]
pub struct ResultStore {
    headers: Vec<ResultHeader>,
    capacity: usize,
    #[cfg(test)]
    header_limit: Option<usize>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_CAPACITY)
    }
}

impl ResultStore {
    /// Store with `initial_capacity` header slots (at least one)
    pub fn new(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            headers: Vec::with_capacity(capacity),
            capacity,
            #[cfg(test)]
            header_limit: None,
        }
    }

    /// Push a copy of `row`. Returns the new header's index.
    pub fn push_value(&mut self, depth: u16, flags: u16, row: &[u8]) -> QueryResult<usize> {
        self.ensure_capacity()?;

        let mut copy = Vec::new();
        copy.try_reserve_exact(row.len())
            .map_err(|_| QueryError::allocation_failed("row copy", row.len()))?;
        copy.extend_from_slice(row);

        self.headers.push(ResultHeader {
            depth,
            tag: flags & !TAG_NULL,
            data: Some(copy.into_boxed_slice()),
        });
        Ok(self.headers.len() - 1)
    }

    /// Push a NULL row. Returns the new header's index.
    pub fn push_null(&mut self, depth: u16, flags: u16) -> QueryResult<usize> {
        self.ensure_capacity()?;
        self.headers.push(ResultHeader {
            depth,
            tag: flags | TAG_NULL,
            data: None,
        });
        Ok(self.headers.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&ResultHeader> {
        self.headers.get(index)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Header slots currently allocated
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultHeader> {
        self.headers.iter()
    }

    /// Transfer ownership of a header's row bytes to the caller.
    ///
    /// The header stays in place with its data reported absent.
    pub fn take_data(&mut self, index: usize) -> Option<Box<[u8]>> {
        self.headers.get_mut(index).and_then(|h| h.data.take())
    }

    /// Drop headers at and after `len`; capacity is kept.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.headers.truncate(len);
    }

    /// Refuse every push once `limit` headers are stored.
    #[cfg(test)]
    pub(crate) fn fail_pushes_after(&mut self, limit: usize) {
        self.header_limit = Some(limit);
    }

    fn ensure_capacity(&mut self) -> QueryResult<()> {
        #[cfg(test)]
        if self.header_limit.is_some_and(|limit| self.headers.len() >= limit) {
            return Err(QueryError::allocation_failed(
                "result headers",
                mem::size_of::<ResultHeader>(),
            ));
        }
        if self.headers.len() == self.capacity {
            self.grow()?;
        }
        Ok(())
    }

    fn grow(&mut self) -> QueryResult<()> {
        let new_capacity = self.capacity.checked_mul(2).ok_or_else(|| {
            QueryError::allocation_failed("result headers", usize::MAX)
        })?;
        let additional = new_capacity - self.headers.len();
        self.headers.try_reserve_exact(additional).map_err(|_| {
            QueryError::allocation_failed(
                "result headers",
                new_capacity.saturating_mul(mem::size_of::<ResultHeader>()),
            )
        })?;

        let old = self.capacity.to_string();
        self.capacity = new_capacity;
        MetricsRegistry::global().increment_header_growths();
        let new = new_capacity.to_string();
        log_event_with_fields(Event::HeaderArrayGrown, &[("from", &old), ("to", &new)]);
        Ok(())
    }
}
