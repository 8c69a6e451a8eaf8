//! Error types for lstore-core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("page is full, cannot write another cell")]
    CapacityExceeded,

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("table '{0}' already exists")]
    DuplicateName(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key in unique index")]
    DuplicateKey,

    #[error("index on column {0} already exists")]
    AlreadyExists(usize),

    #[error("integrity violation: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, Error>;
