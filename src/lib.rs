use pyo3::prelude::*;

mod config;
mod constants;
mod database;
mod errors;
mod helpers;
mod index;
mod page;
mod page_directory;
mod page_range;
mod query;
mod snapshot;
mod table;
mod transaction;
mod transaction_worker;

pub use config::LStoreConfig;
pub use database::Database;
pub use errors::EngineError;
pub use query::Query;
pub use table::{Record, Table};
pub use transaction::Transaction;
pub use transaction_worker::TransactionWorker;

/// A page-based columnar storage engine, exposed to Python as a set of
/// pyclasses: `Database`, `Table`, `Query`, `Record`, `Transaction`, and
/// `TransactionWorker`.
#[pymodule]
fn lstore_rs(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<Database>()?;
    m.add_class::<Table>()?;
    m.add_class::<Query>()?;
    m.add_class::<Record>()?;
    m.add_class::<Transaction>()?;
    m.add_class::<TransactionWorker>()?;
    Ok(())
}
