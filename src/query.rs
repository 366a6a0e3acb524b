use pyo3::prelude::*;

use crate::table::{Record, Table};

fn to_bool_mask(projection: &[i64]) -> Vec<bool> {
    projection.iter().map(|&v| v != 0).collect()
}

/// The public surface a host drives directly: a thin wrapper over a `Table`
/// handle that collapses `EngineResult` into the legacy `bool`/empty-list
/// convention at the Python boundary.
#[pyclass(unsendable)]
pub struct Query {
    table: Table,
}

#[pymethods]
impl Query {
    #[new]
    pub fn new(table: Table) -> Self {
        Query { table }
    }

    pub fn insert(&self, values: Vec<i64>) -> bool {
        self.table.insert(values).is_ok()
    }

    pub fn select(&self, search_key: i64, search_key_index: usize, projection: Vec<i64>) -> Vec<Record> {
        self.table
            .select_latest(search_key, search_key_index, &to_bool_mask(&projection))
    }

    pub fn select_version(
        &self,
        search_key: i64,
        search_key_index: usize,
        projection: Vec<i64>,
        relative_version: i64,
    ) -> Vec<Record> {
        self.table.select_version(
            search_key,
            search_key_index,
            &to_bool_mask(&projection),
            relative_version,
        )
    }

    pub fn update(&self, key: i64, columns: Vec<Option<i64>>) -> bool {
        self.table.update(key, columns).is_ok()
    }

    pub fn delete(&self, key: i64) -> bool {
        self.table.delete(key).is_ok()
    }

    pub fn increment(&self, key: i64, column: usize) -> bool {
        self.table.increment(key, column).is_ok()
    }

    pub fn sum(&self, py: Python, start_range: i64, end_range: i64, agg_column_index: usize) -> PyObject {
        match self.table.sum(start_range, end_range, agg_column_index) {
            Ok(total) => total.into_py(py),
            Err(_) => false.into_py(py),
        }
    }

    pub fn sum_version(
        &self,
        py: Python,
        start_range: i64,
        end_range: i64,
        agg_column_index: usize,
        relative_version: i64,
    ) -> PyObject {
        match self
            .table
            .sum_version(start_range, end_range, agg_column_index, relative_version)
        {
            Ok(total) => total.into_py(py),
            Err(_) => false.into_py(py),
        }
    }

    /// Build an on-demand secondary index over a non-key column, so future
    /// `select`/`select_version` calls on that column index can resolve
    /// directly instead of coming back empty.
    pub fn build_index(&self, column: usize) -> bool {
        self.table.build_index(column).is_ok()
    }
}
