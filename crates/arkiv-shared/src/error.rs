use thiserror::Error;

/// Errors from the wire timestamp codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// The text matched neither accepted timestamp variant.
    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// Asked to encode a timestamp that is not in UTC.  The codec never
    /// converts; callers normalize first.
    #[error("unsupported time zone (offset {offset_secs}s); only UTC can be encoded")]
    UnsupportedTimeZone {
        /// Offset from UTC of the rejected timestamp, in seconds.
        offset_secs: i32,
    },
}

/// Errors from parsing messaging addresses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("malformed address: {0:?}")]
    Malformed(String),
}
