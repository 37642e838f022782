//! Large-object handlers attached to key operations

/// Large-object access for one column of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobHandler {
    /// Read the column's value back after the round trip
    Read {
        column_id: u32,
        /// Caller's field position the value belongs to
        field_number: usize,
        data: Option<Vec<u8>>,
    },
    /// Write `value` to the column as part of the operation
    Write {
        column_id: u32,
        field_number: usize,
        value: Vec<u8>,
    },
}

impl BlobHandler {
    pub fn read(column_id: u32, field_number: usize) -> Self {
        BlobHandler::Read {
            column_id,
            field_number,
            data: None,
        }
    }

    pub fn write(column_id: u32, field_number: usize, value: impl Into<Vec<u8>>) -> Self {
        BlobHandler::Write {
            column_id,
            field_number,
            value: value.into(),
        }
    }

    pub fn column_id(&self) -> u32 {
        match self {
            BlobHandler::Read { column_id, .. } | BlobHandler::Write { column_id, .. } => {
                *column_id
            }
        }
    }

    pub fn field_number(&self) -> usize {
        match self {
            BlobHandler::Read { field_number, .. } | BlobHandler::Write { field_number, .. } => {
                *field_number
            }
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, BlobHandler::Read { .. })
    }

    /// Value read back by a read handler
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            BlobHandler::Read { data, .. } => data.as_deref(),
            BlobHandler::Write { .. } => None,
        }
    }

    /// Store the value read back for a read handler. No-op for writes.
    pub(crate) fn fill(&mut self, bytes: Vec<u8>) {
        if let BlobHandler::Read { data, .. } = self {
            *data = Some(bytes);
        }
    }
}
