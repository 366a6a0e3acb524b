use pyo3::prelude::*;

use crate::transaction::Transaction;

/// Runs a batch of `Transaction`s. The host's thread-per-worker shape isn't
/// load-bearing for correctness here (`Database` already serializes every
/// mutation through the GIL), so this executes its queue sequentially rather
/// than spawning an OS thread per transaction.
#[pyclass(unsendable)]
pub struct TransactionWorker {
    transactions: Vec<Py<Transaction>>,
    results: Vec<bool>,
}

#[pymethods]
impl TransactionWorker {
    #[new]
    pub fn new() -> Self {
        TransactionWorker {
            transactions: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn add_transaction(&mut self, transaction: Py<Transaction>) {
        self.transactions.push(transaction);
    }

    /// Run every queued transaction to completion, in submission order.
    pub fn run(&mut self, py: Python) {
        self.results.clear();
        for transaction in &self.transactions {
            let committed = transaction.borrow_mut(py).run();
            self.results.push(committed);
        }
    }

    /// Sequential execution means there is nothing to wait on; returns the
    /// number of transactions that committed.
    pub fn join(&self) -> usize {
        self.results.iter().filter(|&&committed| committed).count()
    }
}
