use serde::{Deserialize, Serialize};

use crate::config::LStoreConfig;
use crate::errors::{EngineError, EngineResult};
use crate::page::Page;

/// One slot-aligned set of `Page`s, one per user + metadata column. A single
/// logical record occupies the same slot across every `Page` in a group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnGroup {
    columns: Vec<Page>,
}

impl ColumnGroup {
    fn new(num_total_columns: usize, cells_per_page: usize) -> Self {
        ColumnGroup {
            columns: (0..num_total_columns)
                .map(|_| Page::with_capacity(cells_per_page))
                .collect(),
        }
    }

    fn has_capacity(&self) -> bool {
        self.columns.first().map_or(true, Page::has_capacity)
    }

    /// Write one cell to every column at the same (new) slot.
    fn append(&mut self, values: &[i64]) -> EngineResult<usize> {
        let mut slot = 0;
        for (column, &value) in self.columns.iter_mut().zip(values.iter()) {
            slot = column.write(Some(value))?;
        }
        Ok(slot)
    }

    /// Read every column at `slot`.
    fn read_row(&self, slot: usize) -> EngineResult<Vec<i64>> {
        self.columns
            .iter()
            .map(|column| {
                column.read(slot)?.ok_or_else(|| {
                    EngineError::Corrupt(format!("empty cell at slot {}", slot))
                })
            })
            .collect()
    }

    fn overwrite_cell(&mut self, column: usize, slot: usize, value: i64) -> EngineResult<()> {
        self.columns
            .get_mut(column)
            .ok_or_else(|| EngineError::Corrupt(format!("column {} out of bounds", column)))?
            .overwrite(slot, Some(value))
    }

    pub fn columns(&self) -> &[Page] {
        &self.columns
    }
}

/// A bounded set of base page groups plus an unbounded, growing set of tail
/// page groups, for one span of the table's key space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageRange {
    base_groups: Vec<ColumnGroup>,
    tail_groups: Vec<ColumnGroup>,
    num_total_columns: usize,
    cells_per_page: usize,
    base_pages_per_range: usize,
}

impl PageRange {
    /// A range sized to the compile-time default geometry
    /// (`LStoreConfig::default()`), used by callers (and every existing
    /// test) that don't thread a `Database`-level config through.
    pub fn new(num_total_columns: usize) -> Self {
        Self::with_config(num_total_columns, &LStoreConfig::default())
    }

    pub fn with_config(num_total_columns: usize, config: &LStoreConfig) -> Self {
        PageRange {
            base_groups: vec![ColumnGroup::new(num_total_columns, config.cells_per_page)],
            tail_groups: vec![ColumnGroup::new(num_total_columns, config.cells_per_page)],
            num_total_columns,
            cells_per_page: config.cells_per_page,
            base_pages_per_range: config.base_pages_per_range,
        }
    }

    /// Append a base record. Returns `Err(CapacityExhausted)` when this
    /// range's base-page cap (`BASE_PAGES_PER_RANGE`) has been reached, which
    /// signals the `Table` to allocate a new `PageRange`.
    pub fn append_base(&mut self, values: &[i64]) -> EngineResult<(usize, usize)> {
        debug_assert_eq!(values.len(), self.num_total_columns);

        let last = self.base_groups.len() - 1;
        if self.base_groups[last].has_capacity() {
            let slot = self.base_groups[last].append(values)?;
            return Ok((last, slot));
        }

        if self.base_groups.len() >= self.base_pages_per_range {
            return Err(EngineError::CapacityExhausted);
        }

        self.base_groups
            .push(ColumnGroup::new(self.num_total_columns, self.cells_per_page));
        let group_id = self.base_groups.len() - 1;
        let slot = self.base_groups[group_id].append(values)?;
        Ok((group_id, slot))
    }

    /// Append a tail record. Tail groups grow without bound, so this never
    /// fails.
    pub fn append_tail(&mut self, values: &[i64]) -> (usize, usize) {
        debug_assert_eq!(values.len(), self.num_total_columns);

        let last = self.tail_groups.len() - 1;
        if !self.tail_groups[last].has_capacity() {
            self.tail_groups
                .push(ColumnGroup::new(self.num_total_columns, self.cells_per_page));
        }

        let group_id = self.tail_groups.len() - 1;
        // `append` cannot fail here: we just ensured capacity.
        let slot = self.tail_groups[group_id]
            .append(values)
            .expect("freshly-ensured-capacity append cannot fail");
        (group_id, slot)
    }

    pub fn read_base_row(&self, group_id: usize, slot: usize) -> EngineResult<Vec<i64>> {
        self.base_groups
            .get(group_id)
            .ok_or_else(|| EngineError::Corrupt(format!("base group {} out of bounds", group_id)))?
            .read_row(slot)
    }

    pub fn read_tail_row(&self, group_id: usize, slot: usize) -> EngineResult<Vec<i64>> {
        self.tail_groups
            .get(group_id)
            .ok_or_else(|| EngineError::Corrupt(format!("tail group {} out of bounds", group_id)))?
            .read_row(slot)
    }

    /// Rewrite a single base cell in place. Used only for a base record's
    /// `INDIRECTION` column.
    pub fn overwrite_base_cell(
        &mut self,
        group_id: usize,
        slot: usize,
        column: usize,
        value: i64,
    ) -> EngineResult<()> {
        self.base_groups
            .get_mut(group_id)
            .ok_or_else(|| EngineError::Corrupt(format!("base group {} out of bounds", group_id)))?
            .overwrite_cell(column, slot, value)
    }

    pub fn base_groups(&self) -> &[ColumnGroup] {
        &self.base_groups
    }

    pub fn tail_groups(&self) -> &[ColumnGroup] {
        &self.tail_groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BASE_PAGES_PER_RANGE;

    fn row(n: usize, k: i64) -> Vec<i64> {
        (0..n).map(|i| k + i as i64).collect()
    }

    #[test]
    fn append_base_rolls_over_to_new_group_when_full() {
        let mut range = PageRange::new(5);
        // Force a tiny number of base pages full by writing CELLS_PER_PAGE rows.
        for i in 0..crate::constants::CELLS_PER_PAGE {
            range.append_base(&row(5, i as i64)).unwrap();
        }
        // This one must roll to a second base group.
        let (group_id, slot) = range.append_base(&row(5, 999)).unwrap();
        assert_eq!(group_id, 1);
        assert_eq!(slot, 0);
    }

    #[test]
    fn append_base_signals_capacity_exhausted_once_range_is_full() {
        let mut range = PageRange::new(2);
        let total = crate::constants::CELLS_PER_PAGE * BASE_PAGES_PER_RANGE;
        for i in 0..total {
            range.append_base(&row(2, i as i64)).unwrap();
        }
        assert!(matches!(
            range.append_base(&row(2, 0)),
            Err(EngineError::CapacityExhausted)
        ));
    }

    #[test]
    fn tail_append_never_fails_and_rolls_over() {
        let mut range = PageRange::new(3);
        for i in 0..(crate::constants::CELLS_PER_PAGE + 10) {
            range.append_tail(&row(3, i as i64));
        }
        assert_eq!(range.tail_groups().len(), 2);
    }
}
