use serde::{Deserialize, Serialize};

use crate::constants::CELLS_PER_PAGE;
use crate::errors::{EngineError, EngineResult};

/// A fixed-capacity column slab of 64-bit cells with a write cursor.
///
/// Cells are append-only: once a slot has been written it is never
/// overwritten, with the single exception of a base record's `INDIRECTION`
/// cell, which `PageRange::overwrite_base_cell` rewrites in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    cells: Vec<Option<i64>>,
    capacity: usize,
}

impl Page {
    /// Create a new, empty page sized to the compile-time default
    /// (`CELLS_PER_PAGE`).
    pub fn new() -> Self {
        Self::with_capacity(CELLS_PER_PAGE)
    }

    /// Create a new, empty page with an explicit capacity, for callers
    /// driven by a `Database`'s `LStoreConfig` rather than the compile-time
    /// default.
    pub fn with_capacity(capacity: usize) -> Self {
        Page {
            cells: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Whether another cell can be written without exceeding capacity.
    pub fn has_capacity(&self) -> bool {
        self.cells.len() < self.capacity
    }

    /// Append a cell, returning the slot it was written to.
    pub fn write(&mut self, value: Option<i64>) -> EngineResult<usize> {
        if !self.has_capacity() {
            return Err(EngineError::CapacityExhausted);
        }

        self.cells.push(value);
        Ok(self.cells.len() - 1)
    }

    /// Overwrite an already-written cell in place. Used only for a base
    /// record's `INDIRECTION` column.
    pub fn overwrite(&mut self, slot: usize, value: Option<i64>) -> EngineResult<()> {
        if slot >= self.cells.len() {
            return Err(EngineError::Corrupt(format!(
                "overwrite: slot {} out of bounds (len {})",
                slot,
                self.cells.len()
            )));
        }

        self.cells[slot] = value;
        Ok(())
    }

    /// Read a cell; `slot` must be `< cursor`.
    pub fn read(&self, slot: usize) -> EngineResult<Option<i64>> {
        self.cells
            .get(slot)
            .copied()
            .ok_or_else(|| EngineError::Corrupt(format!("read: slot {} out of bounds", slot)))
    }

    /// Number of cells written so far (the write cursor).
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Raw cell array, for serialization.
    pub fn cells(&self) -> &[Option<i64>] {
        &self.cells
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let mut page = Page::new();
        let slot = page.write(Some(42)).unwrap();
        assert_eq!(page.read(slot).unwrap(), Some(42));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut page = Page::new();
        for i in 0..CELLS_PER_PAGE {
            page.write(Some(i as i64)).unwrap();
        }
        assert!(!page.has_capacity());
        assert!(matches!(
            page.write(Some(1)),
            Err(EngineError::CapacityExhausted)
        ));
    }

    #[test]
    fn overwrite_rewrites_existing_slot() {
        let mut page = Page::new();
        let slot = page.write(Some(1)).unwrap();
        page.overwrite(slot, Some(99)).unwrap();
        assert_eq!(page.read(slot).unwrap(), Some(99));
    }
}
