use thiserror::Error;

/// Errors produced by the storage engine's internal primitives.
///
/// `CapacityExhausted` is always absorbed internally (a `Table` allocates a
/// new `PageRange` and retries) and must never escape `src/table.rs`. Every
/// other variant corresponds 1:1 to a taxonomy entry in the public contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("key already exists")]
    KeyExists,

    #[error("key not found")]
    NotFound,

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("page range at capacity")]
    CapacityExhausted,

    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
