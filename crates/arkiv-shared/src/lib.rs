//! # arkiv-shared
//!
//! Leaf types shared by every Arkiv crate: messaging addresses, collection
//! and entry kinds, the wire timestamp codec, and protocol constants.
//!
//! Nothing in this crate performs I/O.

pub mod address;
pub mod constants;
pub mod timefmt;
pub mod types;

mod error;

pub use address::Address;
pub use error::{AddressError, TimeError};
pub use types::{CollectionKind, EntryKind, Id};
