//! Decoding of the meter's hexadecimal sensor payload.
//!
//! The cumulative forward-flow counter lives in hex characters [4, 12) of
//! the payload: a 32-bit field in tenths of a litre. The value
//! is divided by 10 to yield litres; the matching interval delta is scaled
//! back up by 10 where consumption is derived (see `series`).

use thiserror::Error;

/// Hex character span of the forward-flow field within a payload.
const FLOW_FIELD_START: usize = 4;
const FLOW_FIELD_END: usize = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload has {0} characters, need at least 12")]
    TooShort(usize),
    #[error("forward-flow field is not valid hex: {0:?}")]
    InvalidHex(String),
}

/// Decode one payload into its cumulative forward-flow reading in litres.
///
/// Pure and deterministic; the same payload always yields the same value.
pub fn decode_forward_flow(payload: &str) -> Result<f64, DecodeError> {
    let field = payload
        .get(FLOW_FIELD_START..FLOW_FIELD_END)
        .ok_or(DecodeError::TooShort(payload.len()))?;
    let raw = u32::from_str_radix(field, 16)
        .map_err(|_| DecodeError::InvalidHex(field.to_string()))?;
    Ok(f64::from(raw) / 10.0)
}
