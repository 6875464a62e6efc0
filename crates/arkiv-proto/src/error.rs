use std::fmt;

use thiserror::Error;

use arkiv_shared::{AddressError, TimeError};

/// Error detail supplied by the remote side in an error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFault {
    /// Numeric error code attribute, when the server sent one.
    pub code: Option<String>,
    /// Error condition or human-readable text.
    pub text: String,
}

impl fmt::Display for RemoteFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code {})", self.text, code),
            None => write!(f, "{}", self.text),
        }
    }
}

/// Errors produced by the protocol layer.
#[derive(Error, Debug)]
pub enum ProtoError {
    /// Low-level XML reader/writer error.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The payload was well-formed XML but not a valid archive payload.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The page descriptor was missing, duplicated, or carried unexpected
    /// content.
    #[error("malformed page descriptor: {0}")]
    MalformedPageDescriptor(String),

    /// Tried to build a continuation from a cursor without a last-item
    /// marker.
    #[error("invalid cursor: no last-item marker to continue from")]
    InvalidCursor,

    /// An entry element carried a tag outside the known set.
    #[error("unknown entry kind: {0:?}")]
    UnknownEntryKind(String),

    /// A request was asked to build a payload it is not allowed to send.
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),

    /// The server answered with an error response.
    #[error("remote error: {0}")]
    Remote(RemoteFault),

    /// A wire timestamp failed to decode.
    #[error("timestamp error: {0}")]
    Time(#[from] TimeError),

    /// A wire address failed to parse.
    #[error("address error: {0}")]
    Address(#[from] AddressError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProtoError>;
