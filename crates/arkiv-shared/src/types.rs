use serde::{Deserialize, Serialize};

/// Primary key in the local database.
///
/// Storage assigns ids monotonically from a sequence counter; `0` and
/// negative values never name a persisted row.
pub type Id = i64;

/// Kind of an archived conversation.
///
/// The discriminants are the persisted representation; existing databases
/// depend on them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    /// One-to-one chat.
    Chat = 2,
    /// Multi-user room conversation.
    GroupChat = 3,
    /// Pubsub node archive.
    PubSub = 50,
}

impl CollectionKind {
    /// Integer code stored in the `collections.type` column.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Inverse of [`code`](Self::code). Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            2 => Some(Self::Chat),
            3 => Some(Self::GroupChat),
            50 => Some(Self::PubSub),
            _ => None,
        }
    }
}

/// Kind of a single archived event inside a collection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Message written by the archive owner.
    SentMessage = 2,
    /// Message written by the remote peer.
    ReceivedMessage = 3,
    /// System-generated message (presence, room events, ...).
    SystemMessage = 4,
    /// Private note added by the user.
    Note = 5,
    /// Item from a pubsub node.
    PubSubItem = 50,
}

impl EntryKind {
    /// Integer code stored in the `entries.type` column.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Inverse of [`code`](Self::code). Returns `None` for unknown codes.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            2 => Some(Self::SentMessage),
            3 => Some(Self::ReceivedMessage),
            4 => Some(Self::SystemMessage),
            5 => Some(Self::Note),
            50 => Some(Self::PubSubItem),
            _ => None,
        }
    }
}
