//! Conversion between raw bytes and the bus's hex-string payloads.

use crate::{WireError, WireResult};

/// Encode bytes as uppercase hex, two digits per byte, no delimiter.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode a hex string that must describe exactly `expected_len` bytes.
pub fn from_hex(input: &str, expected_len: usize) -> WireResult<Vec<u8>> {
    let expected = expected_len * 2;
    if input.len() != expected {
        return Err(WireError::WrongLength {
            expected,
            actual: input.len(),
        });
    }

    hex::decode(input).map_err(|e| match e {
        hex::FromHexError::InvalidHexCharacter { index, .. } => {
            WireError::InvalidHex { offset: index / 2 }
        }
        // Length is already even and exact here.
        _ => WireError::InvalidHex { offset: 0 },
    })
}

/// Encode an id response. Ids are sent as plain decimal strings.
pub fn encode_id(id: u16) -> String {
    id.to_string()
}
