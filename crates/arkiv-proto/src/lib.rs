//! # arkiv-proto
//!
//! Wire layer of the archive sync engine: a minimal owned XML element
//! tree, the result-set pagination cursor, and the archive request state
//! machine (capability probe, collection listing, collection retrieval).
//!
//! This crate builds and decodes payloads; actually moving them to a
//! server is the transport's job (see `arkiv-sync`).

pub mod cursor;
pub mod element;
pub mod request;

mod error;

pub use cursor::PageCursor;
pub use element::Element;
pub use error::{ProtoError, RemoteFault};
pub use request::{
    ArchiveRequest, CollectionSummary, EntryItem, EntryOffset, ListFilter, Operation,
    RequestStatus, ResultSet,
};
