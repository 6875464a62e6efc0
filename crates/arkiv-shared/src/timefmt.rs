//! Wire timestamp codec.
//!
//! The archive protocol exchanges UTC timestamps as
//! `yyyy-MM-ddThh:mm:ssZ` or `yyyy-MM-ddThh:mm:ss.mmmZ` (millisecond
//! precision, literal trailing `Z`).  There is no timezone offset support:
//! decoding always yields UTC, and encoding refuses anything else.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::error::TimeError;

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const FORMAT_FRACTIONAL: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Decode a wire timestamp.
///
/// Returns the UTC timestamp and whether the text carried a
/// fractional-seconds block.
pub fn decode(text: &str) -> Result<(DateTime<Utc>, bool), TimeError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, FORMAT) {
        return Ok((naive.and_utc(), false));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, FORMAT_FRACTIONAL) {
        return Ok((naive.and_utc(), true));
    }
    Err(TimeError::MalformedTimestamp(text.to_string()))
}

/// Encode a timestamp already known to be UTC.
///
/// With `with_fractional_seconds` the milliseconds are emitted; without it
/// sub-second precision is truncated.
pub fn encode_utc(timestamp: &DateTime<Utc>, with_fractional_seconds: bool) -> String {
    let format = if with_fractional_seconds {
        FORMAT_FRACTIONAL
    } else {
        FORMAT
    };
    timestamp.format(format).to_string()
}

/// Encode a timestamp, refusing non-UTC offsets.
pub fn encode(
    timestamp: &DateTime<FixedOffset>,
    with_fractional_seconds: bool,
) -> Result<String, TimeError> {
    let offset_secs = timestamp.offset().local_minus_utc();
    if offset_secs != 0 {
        return Err(TimeError::UnsupportedTimeZone { offset_secs });
    }
    Ok(encode_utc(
        &timestamp.with_timezone(&Utc),
        with_fractional_seconds,
    ))
}
