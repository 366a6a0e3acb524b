use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::LStoreConfig;
use crate::errors::EngineError;
use crate::page_directory::Rid;
use crate::snapshot;
use crate::table::Table;

fn to_pyerr(err: EngineError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Owns every table in the engine and the single RID counter shared across
/// all of them, so RIDs stay strictly increasing database-wide regardless of
/// which table allocated them.
#[pyclass(unsendable)]
pub struct Database {
    path: Option<PathBuf>,
    tables: HashMap<String, Table>,
    next_rid: Rc<Cell<Rid>>,
    config: LStoreConfig,
}

impl Database {
    /// Construct a database whose tables use an explicit page geometry
    /// instead of the compile-time default (`cells-per-page`,
    /// `base-pages-per-range`). Not exposed to the `pyo3` boundary directly,
    /// since a `#[pyclass]` may declare only one `#[new]`; hosts that need
    /// this reach it through `configure` after construction instead.
    pub fn with_config(config: LStoreConfig) -> Self {
        Database {
            path: None,
            tables: HashMap::new(),
            next_rid: Rc::new(Cell::new(0)),
            config,
        }
    }
}

#[pymethods]
impl Database {
    #[new]
    pub fn new() -> Self {
        Database {
            path: None,
            tables: HashMap::new(),
            next_rid: Rc::new(Cell::new(0)),
            config: LStoreConfig::default(),
        }
    }

    /// Override this database's page geometry for tables created from now
    /// on. Existing tables and any table reloaded from a snapshot keep the
    /// geometry they were created/persisted with.
    pub fn configure(&mut self, cells_per_page: usize, base_pages_per_range: usize) {
        self.config = LStoreConfig {
            cells_per_page,
            base_pages_per_range,
        };
    }

    /// Bind this database to `path`. If a snapshot already exists there, load
    /// it; otherwise start with an empty set of tables.
    pub fn open(&mut self, path: String) -> PyResult<()> {
        let path_buf = PathBuf::from(path);

        if path_buf.exists() {
            self.tables = snapshot::load(&path_buf, self.next_rid.clone()).map_err(to_pyerr)?;
        } else {
            self.tables.clear();
        }

        self.path = Some(path_buf);
        Ok(())
    }

    /// Persist every table to the bound path in one atomic snapshot write.
    /// The engine carries no durability guarantee before this call returns.
    pub fn close(&self) -> PyResult<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("database has no bound path; call open() first"))?;
        snapshot::save(path, &self.tables).map_err(to_pyerr)
    }

    pub fn create_table(&mut self, name: String, num_columns: usize, key_index: usize) -> PyResult<Table> {
        if self.tables.contains_key(&name) {
            return Err(PyValueError::new_err(format!("table '{name}' already exists")));
        }

        let table = Table::with_config(
            name.clone(),
            num_columns,
            key_index,
            self.next_rid.clone(),
            self.config,
        )
        .map_err(to_pyerr)?;
        self.tables.insert(name, table.clone());
        Ok(table)
    }

    pub fn get_table(&self, name: String) -> PyResult<Table> {
        self.tables
            .get(&name)
            .cloned()
            .ok_or_else(|| PyValueError::new_err(format!("no such table '{name}'")))
    }

    pub fn drop_table(&mut self, name: String) {
        self.tables.remove(&name);
    }
}
