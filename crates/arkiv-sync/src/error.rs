use thiserror::Error;

use arkiv_proto::ProtoError;
use arkiv_store::StoreError;

use crate::transport::TransportError;

/// Errors produced by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Payload building or response decoding failed.
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),

    /// Persisting fetched data failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The transport could not complete the round trip.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No response arrived within the configured deadline.
    #[error("request timed out")]
    Timeout,

    /// The remote side supports none of the known archive namespaces.
    #[error("no supported archive namespace")]
    NoSupportedNamespace,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
