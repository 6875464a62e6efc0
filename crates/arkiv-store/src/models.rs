//! Domain model structs persisted in the local database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a presentation layer over IPC.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arkiv_shared::{Address, CollectionKind, EntryKind, Id};

/// One archived conversation, the parent of its entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection {
    /// Primary key, assigned by [`Storage`](crate::Storage) and immutable
    /// afterwards.
    pub id: Id,
    /// What kind of conversation this is.
    pub kind: CollectionKind,
    /// The local account the archive belongs to (bare form).
    pub owner: Address,
    /// The remote peer or room (bare form).
    pub contact: Address,
    /// Free-text subject; empty on creation.
    pub subject: String,
    /// When the conversation started (UTC).
    pub start: DateTime<Utc>,
}

/// One archived message, note, or system event inside a collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Primary key, assigned by [`Storage`](crate::Storage).
    pub id: Id,
    /// The collection this entry belongs to.
    pub collection_id: Id,
    /// What kind of event this is.
    pub kind: EntryKind,
    /// The peer the event is attributed to.
    pub peer: Address,
    /// Nickname of the peer (useful in group chats).
    pub nickname: String,
    /// Message text.
    pub body: String,
    /// When the event happened (UTC).
    pub utc: DateTime<Utc>,
}
