use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pyo3::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::LStoreConfig;
use crate::constants::{META_INDIRECTION, META_SCHEMA_ENCODING, NUM_METADATA_COLS};
use crate::errors::{EngineError, EngineResult};
use crate::helpers::{accumulate_schema, changed_mask, overlay_columns};
use crate::index::{Indexer, PrimaryIndex};
use crate::page_directory::{GroupKind, Location, PageDirectory, Rid};
use crate::page_range::PageRange;

/// A projected, materialized record returned from `select`/`select_version`.
/// Only user columns are exposed, in declaration order.
#[pyclass]
#[derive(Clone, Debug)]
pub struct Record {
    #[pyo3(get)]
    pub rid: Rid,
    #[pyo3(get)]
    pub key: i64,
    #[pyo3(get)]
    pub columns: Vec<i64>,
}

#[pymethods]
impl Record {
    #[new]
    pub fn new(rid: Rid, key: i64, columns: Vec<i64>) -> Self {
        Record { rid, key, columns }
    }
}

/// On-disk mirror of a table's persistent state, used by `src/snapshot.rs`.
#[derive(Serialize, Deserialize)]
pub struct TableSnapshot {
    pub name: String,
    pub num_columns: usize,
    pub key_column: usize,
    pub next_rid: Rid,
    pub next_timestamp: i64,
    pub config: LStoreConfig,
    pub primary: PrimaryIndex,
    pub indexer: Indexer,
    pub directory: PageDirectory,
    pub ranges: Vec<PageRange>,
}

/// The owned engine state for one table. Wrapped by `Table`, a cheap,
/// clonable `Rc<RefCell<_>>` handle, so `Query` and queued `Transaction`
/// operations can share the same live table.
struct TableState {
    name: String,
    num_columns: usize,
    key_column: usize,
    next_rid: Rc<Cell<Rid>>,
    next_timestamp: Cell<i64>,
    config: LStoreConfig,
    ranges: Vec<PageRange>,
    directory: PageDirectory,
    primary: PrimaryIndex,
    indexer: Indexer,
}

impl TableState {
    fn total_columns(&self) -> usize {
        self.num_columns + NUM_METADATA_COLS
    }

    fn allocate_rid(&self) -> Rid {
        let rid = self.next_rid.get();
        self.next_rid.set(rid + 1);
        rid
    }

    fn allocate_timestamp(&self) -> i64 {
        let ts = self.next_timestamp.get();
        self.next_timestamp.set(ts + 1);
        ts
    }

    fn read_row_at(&self, loc: Location) -> EngineResult<Vec<i64>> {
        let range = self
            .ranges
            .get(loc.range_id)
            .ok_or_else(|| EngineError::Corrupt(format!("range {} out of bounds", loc.range_id)))?;
        match loc.kind {
            GroupKind::Base => range.read_base_row(loc.group_id, loc.slot),
            GroupKind::Tail => range.read_tail_row(loc.group_id, loc.slot),
        }
    }

    /// Append a base record, rolling over to a fresh `PageRange` when the
    /// current one's base-page cap is exhausted.
    fn append_base_with_rollover(&mut self, row: &[i64]) -> (usize, usize, usize) {
        loop {
            let range_id = self.ranges.len() - 1;
            match self.ranges[range_id].append_base(row) {
                Ok((group_id, slot)) => return (range_id, group_id, slot),
                Err(EngineError::CapacityExhausted) => {
                    log::debug!(
                        "table {}: page range {} full, allocating a new range",
                        self.name,
                        range_id
                    );
                    self.ranges
                        .push(PageRange::with_config(self.total_columns(), &self.config));
                }
                Err(other) => unreachable!("append_base failed unexpectedly: {other}"),
            }
        }
    }

    fn append_tail_in_range(&mut self, range_id: usize, row: &[i64]) -> (usize, usize) {
        self.ranges[range_id].append_tail(row)
    }

    /// Read the full row (user + metadata columns) representing the record
    /// `relative_version` hops back from the latest version of `base_rid`'s
    /// logical record. `relative_version` is clamped to the base once the
    /// tail chain is exhausted.
    fn read_version_row(&self, base_rid: Rid, relative_version: i64) -> EngineResult<Vec<i64>> {
        let base_loc = self.directory.get(base_rid).ok_or(EngineError::NotFound)?;
        let base_row = self.read_row_at(base_loc)?;
        let indirection = base_row[self.num_columns + META_INDIRECTION] as Rid;

        if indirection == base_rid {
            // No tails were ever created for this logical record.
            return Ok(base_row);
        }

        let hops = relative_version.unsigned_abs() as usize;
        let mut current = indirection;
        let mut travelled = 0usize;

        loop {
            let loc = self
                .directory
                .get(current)
                .ok_or_else(|| EngineError::Corrupt(format!("dangling tail rid {}", current)))?;
            let row = self.read_row_at(loc)?;

            if travelled == hops {
                return Ok(row);
            }

            let prev = row[self.num_columns + META_INDIRECTION] as Rid;
            if prev == base_rid {
                // Reached the oldest tail; any further hops clamp to base.
                return Ok(base_row);
            }

            current = prev;
            travelled += 1;
        }
    }

    fn insert(&mut self, values: Vec<i64>) -> EngineResult<Rid> {
        if values.len() != self.num_columns {
            return Err(EngineError::SchemaViolation(format!(
                "expected {} columns, got {}",
                self.num_columns,
                values.len()
            )));
        }

        let key = values[self.key_column];
        if self.primary.contains(key) {
            return Err(EngineError::KeyExists);
        }

        let rid = self.allocate_rid();
        let ts = self.allocate_timestamp();

        let mut row = values.clone();
        row.push(rid as i64); // RID
        row.push(rid as i64); // INDIRECTION: sentinel "no tail" = self
        row.push(0); // SCHEMA_ENCODING
        row.push(ts); // TIMESTAMP

        let (range_id, group_id, slot) = self.append_base_with_rollover(&row);
        self.directory
            .insert(rid, Location::base(range_id, group_id, slot));
        self.primary.insert(key, rid);

        for column in 0..self.num_columns {
            if self.indexer.is_built(column) {
                self.indexer.insert(column, values[column], rid);
            }
        }

        log::trace!("table {}: inserted key {} as rid {}", self.name, key, rid);
        Ok(rid)
    }

    fn resolve_base_rids(&self, key: i64, key_column: usize) -> Vec<Rid> {
        if key_column == self.key_column {
            self.primary.get(key).into_iter().collect()
        } else if self.indexer.is_built(key_column) {
            self.indexer
                .lookup(key_column, key)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        }
    }

    fn select_version(
        &self,
        key: i64,
        key_column: usize,
        projection: &[bool],
        relative_version: i64,
    ) -> Vec<Record> {
        let base_rids = self.resolve_base_rids(key, key_column);
        let mut results = Vec::with_capacity(base_rids.len());

        for base_rid in base_rids {
            let row = match self.read_version_row(base_rid, relative_version) {
                Ok(row) => row,
                Err(_) => continue,
            };

            let columns: Vec<i64> = row[..self.num_columns]
                .iter()
                .zip(projection.iter())
                .filter(|(_, &keep)| keep)
                .map(|(&value, _)| value)
                .collect();

            results.push(Record::new(base_rid, key, columns));
        }

        results
    }

    fn select_latest(&self, key: i64, key_column: usize, projection: &[bool]) -> Vec<Record> {
        self.select_version(key, key_column, projection, 0)
    }

    fn current_user_values(&self, key: i64) -> EngineResult<Vec<i64>> {
        let base_rid = self.primary.get(key).ok_or(EngineError::NotFound)?;
        let row = self.read_version_row(base_rid, 0)?;
        Ok(row[..self.num_columns].to_vec())
    }

    fn current_indirection(&self, key: i64) -> EngineResult<Rid> {
        let base_rid = self.primary.get(key).ok_or(EngineError::NotFound)?;
        let loc = self.directory.get(base_rid).ok_or(EngineError::NotFound)?;
        let row = self.read_row_at(loc)?;
        Ok(row[self.num_columns + META_INDIRECTION] as Rid)
    }

    fn update(&mut self, key: i64, overlay: Vec<Option<i64>>) -> EngineResult<Rid> {
        if overlay.len() != self.num_columns {
            return Err(EngineError::SchemaViolation(format!(
                "expected {} columns, got {}",
                self.num_columns,
                overlay.len()
            )));
        }

        if let Some(new_key) = overlay[self.key_column] {
            if new_key != key {
                return Err(EngineError::SchemaViolation(
                    "primary key column is immutable".to_string(),
                ));
            }
        }

        let base_rid = self.primary.get(key).ok_or(EngineError::NotFound)?;
        let base_loc = self.directory.get(base_rid).ok_or(EngineError::NotFound)?;
        let base_row = self.read_row_at(base_loc)?;
        let current_indirection = base_row[self.num_columns + META_INDIRECTION] as Rid;

        let current_row = if current_indirection == base_rid {
            base_row.clone()
        } else {
            let loc = self
                .directory
                .get(current_indirection)
                .ok_or_else(|| EngineError::Corrupt("dangling indirection".to_string()))?;
            self.read_row_at(loc)?
        };

        let current_values = &current_row[..self.num_columns];
        let current_schema = current_row[self.num_columns + META_SCHEMA_ENCODING];

        let new_values = overlay_columns(current_values, &overlay);
        let changed = changed_mask(&overlay);
        let new_schema = accumulate_schema(current_schema, changed);

        let rid = self.allocate_rid();
        let ts = self.allocate_timestamp();

        let mut row = new_values.clone();
        row.push(rid as i64); // RID
        row.push(current_indirection as i64); // INDIRECTION -> previous newest (or base)
        row.push(new_schema);
        row.push(ts);

        let (group_id, slot) = self.append_tail_in_range(base_loc.range_id, &row);
        self.directory
            .insert(rid, Location::tail(base_loc.range_id, group_id, slot));

        self.ranges[base_loc.range_id].overwrite_base_cell(
            base_loc.group_id,
            base_loc.slot,
            self.num_columns + META_INDIRECTION,
            rid as i64,
        )?;

        for column in 0..self.num_columns {
            if self.indexer.is_built(column) {
                self.indexer
                    .update(column, current_values[column], new_values[column], base_rid);
            }
        }

        log::trace!("table {}: updated key {} via tail rid {}", self.name, key, rid);
        Ok(rid)
    }

    fn increment(&mut self, key: i64, column: usize) -> EngineResult<Rid> {
        if column >= self.num_columns {
            return Err(EngineError::SchemaViolation(format!(
                "column {} out of bounds",
                column
            )));
        }

        let current = self.current_user_values(key)?;
        let mut overlay = vec![None; self.num_columns];
        overlay[column] = Some(current[column] + 1);
        self.update(key, overlay)
    }

    fn delete(&mut self, key: i64) -> EngineResult<()> {
        let base_rid = self.primary.get(key).ok_or(EngineError::NotFound)?;

        if self.indexer.secondary().iter().any(Option::is_some) {
            let row = self.read_version_row(base_rid, 0)?;
            for column in 0..self.num_columns {
                if self.indexer.is_built(column) {
                    self.indexer.remove(column, row[column], base_rid);
                }
            }
        }

        self.primary.remove(key);
        self.directory.remove(base_rid);
        Ok(())
    }

    fn sum_generic(
        &self,
        lo: i64,
        hi: i64,
        column: usize,
        relative_version: i64,
    ) -> EngineResult<i64> {
        let mut total = 0i64;
        let mut seen_any = false;

        for (_, base_rid) in self.primary.range(lo, hi) {
            let row = self.read_version_row(base_rid, relative_version)?;
            total += row[column];
            seen_any = true;
        }

        if seen_any {
            Ok(total)
        } else {
            Err(EngineError::NotFound)
        }
    }

    fn build_index(&mut self, column: usize) -> EngineResult<()> {
        if column >= self.num_columns {
            return Err(EngineError::SchemaViolation(format!(
                "column {} out of bounds",
                column
            )));
        }

        let keys: Vec<(i64, Rid)> = self.primary.iter().collect();
        let mut pairs = Vec::with_capacity(keys.len());
        for (_, rid) in keys {
            let row = self.read_version_row(rid, 0)?;
            pairs.push((row[column], rid));
        }

        self.indexer.build(column, pairs.into_iter());
        Ok(())
    }

    /// Compensating write used by `Transaction::abort`: append a tail whose
    /// post-image equals `prev_values`, then point the base's `INDIRECTION`
    /// directly back at `prev_indirection`, hiding the compensating tail.
    fn compensate_update(
        &mut self,
        key: i64,
        prev_values: &[i64],
        prev_indirection: Rid,
    ) -> EngineResult<()> {
        let base_rid = self.primary.get(key).ok_or(EngineError::NotFound)?;
        let base_loc = self.directory.get(base_rid).ok_or(EngineError::NotFound)?;
        let base_row = self.read_row_at(base_loc)?;
        let current_indirection = base_row[self.num_columns + META_INDIRECTION] as Rid;

        let current_row = if current_indirection == base_rid {
            base_row.clone()
        } else {
            let loc = self
                .directory
                .get(current_indirection)
                .ok_or_else(|| EngineError::Corrupt("dangling indirection".to_string()))?;
            self.read_row_at(loc)?
        };
        let current_values = current_row[..self.num_columns].to_vec();
        let current_schema = current_row[self.num_columns + META_SCHEMA_ENCODING];

        let rid = self.allocate_rid();
        let ts = self.allocate_timestamp();

        let mut row = prev_values.to_vec();
        row.push(rid as i64);
        row.push(current_indirection as i64);
        row.push(current_schema);
        row.push(ts);

        let (group_id, slot) = self.append_tail_in_range(base_loc.range_id, &row);
        self.directory
            .insert(rid, Location::tail(base_loc.range_id, group_id, slot));

        self.ranges[base_loc.range_id].overwrite_base_cell(
            base_loc.group_id,
            base_loc.slot,
            self.num_columns + META_INDIRECTION,
            prev_indirection as i64,
        )?;

        for column in 0..self.num_columns {
            if self.indexer.is_built(column) {
                self.indexer
                    .update(column, current_values[column], prev_values[column], base_rid);
            }
        }

        log::trace!(
            "table {}: compensated update for key {} (hid tail {})",
            self.name,
            key,
            rid
        );
        Ok(())
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            name: self.name.clone(),
            num_columns: self.num_columns,
            key_column: self.key_column,
            next_rid: self.next_rid.get(),
            next_timestamp: self.next_timestamp.get(),
            config: self.config,
            primary: self.primary.clone(),
            indexer: self.indexer.clone(),
            directory: self.directory.clone(),
            ranges: self.ranges.clone(),
        }
    }

    fn from_snapshot(snap: TableSnapshot, next_rid: Rc<Cell<Rid>>) -> Self {
        TableState {
            name: snap.name,
            num_columns: snap.num_columns,
            key_column: snap.key_column,
            next_rid,
            next_timestamp: Cell::new(snap.next_timestamp),
            config: snap.config,
            ranges: snap.ranges,
            directory: snap.directory,
            primary: snap.primary,
            indexer: snap.indexer,
        }
    }
}

/// A cheap, clonable handle onto a table's shared engine state. Multiple
/// `Table` values (held by `Query`, by `Database`, and by queued
/// `Transaction` operations) may refer to the same underlying state.
#[pyclass(unsendable)]
#[derive(Clone)]
pub struct Table {
    inner: Rc<RefCell<TableState>>,
}

impl Table {
    pub(crate) fn new(
        name: String,
        num_columns: usize,
        key_column: usize,
        next_rid: Rc<Cell<Rid>>,
    ) -> EngineResult<Self> {
        Self::with_config(name, num_columns, key_column, next_rid, LStoreConfig::default())
    }

    pub(crate) fn with_config(
        name: String,
        num_columns: usize,
        key_column: usize,
        next_rid: Rc<Cell<Rid>>,
        config: LStoreConfig,
    ) -> EngineResult<Self> {
        if num_columns == 0 {
            return Err(EngineError::SchemaViolation(
                "a table must have at least one column".to_string(),
            ));
        }
        if key_column >= num_columns {
            return Err(EngineError::SchemaViolation(format!(
                "key column {} out of bounds for {} columns",
                key_column, num_columns
            )));
        }

        let state = TableState {
            name,
            num_columns,
            key_column,
            next_rid,
            next_timestamp: Cell::new(0),
            config,
            ranges: vec![PageRange::with_config(
                num_columns + NUM_METADATA_COLS,
                &config,
            )],
            directory: PageDirectory::new(),
            primary: PrimaryIndex::new(),
            indexer: Indexer::new(num_columns),
        };

        Ok(Table {
            inner: Rc::new(RefCell::new(state)),
        })
    }

    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    pub fn num_columns(&self) -> usize {
        self.inner.borrow().num_columns
    }

    pub fn key_column(&self) -> usize {
        self.inner.borrow().key_column
    }

    pub fn insert(&self, values: Vec<i64>) -> EngineResult<Rid> {
        self.inner.borrow_mut().insert(values)
    }

    pub fn select_latest(&self, key: i64, key_column: usize, projection: &[bool]) -> Vec<Record> {
        self.inner.borrow().select_latest(key, key_column, projection)
    }

    pub fn select_version(
        &self,
        key: i64,
        key_column: usize,
        projection: &[bool],
        relative_version: i64,
    ) -> Vec<Record> {
        self.inner
            .borrow()
            .select_version(key, key_column, projection, relative_version)
    }

    pub fn update(&self, key: i64, overlay: Vec<Option<i64>>) -> EngineResult<Rid> {
        self.inner.borrow_mut().update(key, overlay)
    }

    pub fn increment(&self, key: i64, column: usize) -> EngineResult<Rid> {
        self.inner.borrow_mut().increment(key, column)
    }

    pub fn delete(&self, key: i64) -> EngineResult<()> {
        self.inner.borrow_mut().delete(key)
    }

    pub fn sum(&self, lo: i64, hi: i64, column: usize) -> EngineResult<i64> {
        self.inner.borrow().sum_generic(lo, hi, column, 0)
    }

    pub fn sum_version(
        &self,
        lo: i64,
        hi: i64,
        column: usize,
        relative_version: i64,
    ) -> EngineResult<i64> {
        self.inner
            .borrow()
            .sum_generic(lo, hi, column, relative_version)
    }

    pub fn build_index(&self, column: usize) -> EngineResult<()> {
        self.inner.borrow_mut().build_index(column)
    }

    pub fn current_user_values(&self, key: i64) -> EngineResult<Vec<i64>> {
        self.inner.borrow().current_user_values(key)
    }

    pub fn current_indirection(&self, key: i64) -> EngineResult<Rid> {
        self.inner.borrow().current_indirection(key)
    }

    pub fn compensate_update(
        &self,
        key: i64,
        prev_values: &[i64],
        prev_indirection: Rid,
    ) -> EngineResult<()> {
        self.inner
            .borrow_mut()
            .compensate_update(key, prev_values, prev_indirection)
    }

    pub(crate) fn snapshot(&self) -> TableSnapshot {
        self.inner.borrow().snapshot()
    }

    pub(crate) fn from_snapshot(snap: TableSnapshot, next_rid: Rc<Cell<Rid>>) -> Self {
        Table {
            inner: Rc::new(RefCell::new(TableState::from_snapshot(snap, next_rid))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_table(n: usize, k: usize) -> Table {
        Table::new("t".to_string(), n, k, Rc::new(Cell::new(0))).unwrap()
    }

    fn mask(n: usize) -> Vec<bool> {
        vec![true; n]
    }

    #[test]
    fn insert_then_select_round_trips() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 100, 200]).unwrap();
        let got = table.select_latest(1, 0, &mask(3));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].columns, vec![1, 100, 200]);
    }

    #[test]
    fn duplicate_insert_fails_without_altering_state() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 100, 200]).unwrap();
        assert_eq!(table.insert(vec![1, 1, 1]), Err(EngineError::KeyExists));
        let got = table.select_latest(1, 0, &mask(3));
        assert_eq!(got[0].columns, vec![1, 100, 200]);
    }

    #[test]
    fn update_and_version_walk() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 100, 200]).unwrap();
        table.update(1, vec![None, Some(999), Some(888)]).unwrap();

        let latest = table.select_latest(1, 0, &mask(3));
        assert_eq!(latest[0].columns, vec![1, 999, 888]);

        let one_back = table.select_version(1, 0, &mask(3), -1);
        assert_eq!(one_back[0].columns, vec![1, 100, 200]);

        let far_back = table.select_version(1, 0, &mask(3), -5);
        assert_eq!(far_back[0].columns, vec![1, 100, 200]);
    }

    #[test]
    fn delete_then_sum_excludes_deleted_keys() {
        let table = fresh_table(5, 0);
        for k in 10..20 {
            table.insert(vec![k, 93, 0, 0, 0]).unwrap();
        }
        for k in (10..20).step_by(2) {
            table.delete(k).unwrap();
        }
        assert_eq!(table.sum(10, 19, 1).unwrap(), 5 * 93);
    }

    #[test]
    fn sum_over_empty_range_is_not_found() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 1, 1]).unwrap();
        assert_eq!(table.sum(100, 200, 1), Err(EngineError::NotFound));
    }

    #[test]
    fn primary_key_column_is_immutable() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 1, 1]).unwrap();
        assert!(matches!(
            table.update(1, vec![Some(2), None, None]),
            Err(EngineError::SchemaViolation(_))
        ));
    }

    #[test]
    fn no_op_update_still_creates_a_version() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 10, 20]).unwrap();
        table.update(1, vec![None, None, None]).unwrap();
        let latest = table.select_latest(1, 0, &mask(3));
        assert_eq!(latest[0].columns, vec![1, 10, 20]);
        let base_version = table.select_version(1, 0, &mask(3), -1);
        assert_eq!(base_version[0].columns, vec![1, 10, 20]);
    }

    #[test]
    fn increment_adds_one_to_target_column() {
        let table = fresh_table(2, 0);
        table.insert(vec![1, 41]).unwrap();
        table.increment(1, 1).unwrap();
        let latest = table.select_latest(1, 0, &mask(2));
        assert_eq!(latest[0].columns, vec![1, 42]);
    }

    #[test]
    fn page_range_rollover_keeps_inserts_correct() {
        let table = fresh_table(2, 0);
        let total = crate::constants::CELLS_PER_PAGE * crate::constants::BASE_PAGES_PER_RANGE + 5;
        for k in 0..total as i64 {
            table.insert(vec![k, k * 2]).unwrap();
        }
        let got = table.select_latest((total - 1) as i64, 0, &mask(2));
        assert_eq!(
            got[0].columns,
            vec![(total - 1) as i64, (total - 1) as i64 * 2]
        );
    }

    #[test]
    fn compensate_update_restores_previous_values() {
        let table = fresh_table(3, 0);
        table.insert(vec![1, 10, 20]).unwrap();
        let prev_values = table.current_user_values(1).unwrap();
        let prev_indirection = table.current_indirection(1).unwrap();
        table.update(1, vec![None, Some(999), Some(888)]).unwrap();
        table
            .compensate_update(1, &prev_values, prev_indirection)
            .unwrap();
        let latest = table.select_latest(1, 0, &mask(3));
        assert_eq!(latest[0].columns, vec![1, 10, 20]);
    }
}
