//! # arkiv-sync
//!
//! The sync engine: drives the fetch-then-persist loop that mirrors a
//! remote message archive into local storage.
//!
//! A pass probes the supported protocol namespace, walks the collection
//! listing page by page, and for every collection runs an independent
//! entry-retrieval chain to its last page.  Everything fetched is
//! upserted into [`arkiv_store::Storage`]; a failed chain only stops
//! itself, and re-running the pass resumes idempotently.

pub mod config;
pub mod engine;
pub mod events;
pub mod transport;

mod error;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::SyncError;
pub use events::{SyncEvent, SyncFailure, SyncReport};
pub use transport::{MockKey, MockTransport, Transport, TransportError};
