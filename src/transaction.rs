use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::errors::EngineError;
use crate::page_directory::Rid;
use crate::table::Table;

/// One queued operation, bound to the `Table` handle it targets.
#[derive(Clone)]
enum Op {
    Insert { table: Table, values: Vec<i64> },
    Update { table: Table, key: i64, columns: Vec<Option<i64>> },
    Delete { table: Table, key: i64 },
    Increment { table: Table, key: i64, column: usize },
}

/// What actually happened when an `Op` ran, carrying enough of the
/// pre-image to undo it.
enum AppliedOp {
    Insert { table: Table, key: i64 },
    Update {
        table: Table,
        key: i64,
        prev_values: Vec<i64>,
        prev_indirection: Rid,
    },
    Delete { table: Table, prev_values: Vec<i64> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Open,
    Committed,
    Aborted,
}

/// A queued batch of `Table` operations that runs to completion or rolls
/// every applied effect back, in reverse order, on the first failure.
#[pyclass(unsendable)]
pub struct Transaction {
    queue: Vec<Op>,
    applied: Vec<AppliedOp>,
    state: TxState,
}

impl Transaction {
    fn ensure_open(&self) -> PyResult<()> {
        if self.state != TxState::Open {
            return Err(PyValueError::new_err(
                "transaction is no longer open for new operations",
            ));
        }
        Ok(())
    }

    fn capture_and_execute(op: &Op) -> Result<AppliedOp, EngineError> {
        match op {
            Op::Insert { table, values } => {
                let key = values[table.key_column()];
                table.insert(values.clone())?;
                Ok(AppliedOp::Insert {
                    table: table.clone(),
                    key,
                })
            }
            Op::Update { table, key, columns } => {
                let prev_values = table.current_user_values(*key)?;
                let prev_indirection = table.current_indirection(*key)?;
                table.update(*key, columns.clone())?;
                Ok(AppliedOp::Update {
                    table: table.clone(),
                    key: *key,
                    prev_values,
                    prev_indirection,
                })
            }
            Op::Delete { table, key } => {
                let prev_values = table.current_user_values(*key)?;
                table.delete(*key)?;
                Ok(AppliedOp::Delete {
                    table: table.clone(),
                    prev_values,
                })
            }
            Op::Increment { table, key, column } => {
                let prev_values = table.current_user_values(*key)?;
                let prev_indirection = table.current_indirection(*key)?;
                table.increment(*key, *column)?;
                Ok(AppliedOp::Update {
                    table: table.clone(),
                    key: *key,
                    prev_values,
                    prev_indirection,
                })
            }
        }
    }

    /// Undo every applied effect, most recent first. Best-effort: an
    /// individual compensating write cannot itself fail for a transaction
    /// that got this far, since the record it targets is known to exist.
    fn internal_abort(&mut self) {
        while let Some(applied) = self.applied.pop() {
            match applied {
                AppliedOp::Insert { table, key } => {
                    let _ = table.delete(key);
                }
                AppliedOp::Update {
                    table,
                    key,
                    prev_values,
                    prev_indirection,
                } => {
                    let _ = table.compensate_update(key, &prev_values, prev_indirection);
                }
                AppliedOp::Delete { table, prev_values } => {
                    let _ = table.insert(prev_values);
                }
            }
        }
    }
}

#[pymethods]
impl Transaction {
    #[new]
    pub fn new() -> Self {
        Transaction {
            queue: Vec::new(),
            applied: Vec::new(),
            state: TxState::Open,
        }
    }

    pub fn add_insert(&mut self, table: Table, values: Vec<i64>) -> PyResult<()> {
        self.ensure_open()?;
        self.queue.push(Op::Insert { table, values });
        Ok(())
    }

    pub fn add_update(&mut self, table: Table, key: i64, columns: Vec<Option<i64>>) -> PyResult<()> {
        self.ensure_open()?;
        self.queue.push(Op::Update { table, key, columns });
        Ok(())
    }

    pub fn add_delete(&mut self, table: Table, key: i64) -> PyResult<()> {
        self.ensure_open()?;
        self.queue.push(Op::Delete { table, key });
        Ok(())
    }

    pub fn add_increment(&mut self, table: Table, key: i64, column: usize) -> PyResult<()> {
        self.ensure_open()?;
        self.queue.push(Op::Increment { table, key, column });
        Ok(())
    }

    /// Execute every queued operation in order. Aborts and rolls back on the
    /// first failure. Returns whether the transaction committed.
    pub fn run(&mut self) -> bool {
        if self.state != TxState::Open {
            return false;
        }

        for op in self.queue.clone() {
            match Self::capture_and_execute(&op) {
                Ok(applied) => self.applied.push(applied),
                Err(_) => {
                    self.internal_abort();
                    self.state = TxState::Aborted;
                    return false;
                }
            }
        }

        self.state = TxState::Committed;
        true
    }

    /// Roll back every applied effect, whether the transaction already
    /// committed or aborted mid-run. Idempotent: calling it twice is a
    /// harmless no-op the second time.
    pub fn abort(&mut self) -> bool {
        self.internal_abort();
        self.state = TxState::Aborted;
        true
    }

    /// `Open` transactions finalize by running; `Committed`/`Aborted` ones
    /// report their existing outcome.
    pub fn commit(&mut self) -> bool {
        match self.state {
            TxState::Committed => true,
            TxState::Aborted => false,
            TxState::Open => self.run(),
        }
    }
}
