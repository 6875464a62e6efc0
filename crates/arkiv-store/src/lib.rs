//! # arkiv-store
//!
//! Local storage for archived conversations, backed by SQLite.
//!
//! The crate exposes a synchronous [`Storage`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for collections
//! and their entries.  Identifiers are allocated from SQLite's sequence
//! counters, so they stay monotonic across deletions and are never reused.
//!
//! Storage is a single-writer component: mutating methods take
//! `&mut self`, and callers that share a handle across tasks must
//! serialize access themselves.

pub mod collections;
pub mod database;
pub mod entries;
pub mod migrations;
pub mod models;

mod error;

pub use database::Storage;
pub use error::StoreError;
pub use models::*;
