use std::path::PathBuf;

use thiserror::Error;

use arkiv_shared::{AddressError, Id, TimeError};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The backing file could not be opened for read/write.
    #[error("could not open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to determine a platform data directory.
    #[error("could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("record not found")]
    NotFound,

    /// An entry referenced a collection id that names no collection.
    #[error("no collection with id {0}")]
    MissingCollection(Id),

    /// Migration failure.
    #[error("migration error: {0}")]
    Migration(String),

    /// A persisted timestamp failed to decode.
    #[error("timestamp error: {0}")]
    Time(#[from] TimeError),

    /// A persisted address failed to parse.
    #[error("address error: {0}")]
    Address(#[from] AddressError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
