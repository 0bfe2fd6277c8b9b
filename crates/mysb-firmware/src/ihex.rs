//! Intel-HEX record parsing.
//!
//! ```text
//! :LLAAAATTDD...DDCC
//!  |  |   | |     +-- checksum: two's complement of the sum of all prior bytes
//!  |  |   | +-------- LL data bytes
//!  |  |   +---------- record type
//!  |  +-------------- 16-bit load address (big-endian)
//!  +----------------- data byte count
//! ```
//!
//! Only [`RecordKind::Data`] records contribute to a firmware image; the
//! address-extension and start-address kinds are parsed but carry nothing the
//! bootloader needs.

use thiserror::Error;

/// Intel-HEX record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// 0x00: data bytes at an address.
    Data,
    /// 0x01: end of file.
    EndOfFile,
    /// 0x02: extended segment address.
    ExtendedSegmentAddress,
    /// 0x03: start segment address.
    StartSegmentAddress,
    /// 0x04: extended linear address.
    ExtendedLinearAddress,
    /// 0x05: start linear address.
    StartLinearAddress,
    /// Anything else.
    Unknown(u8),
}

impl From<u8> for RecordKind {
    fn from(code: u8) -> Self {
        match code {
            0x00 => RecordKind::Data,
            0x01 => RecordKind::EndOfFile,
            0x02 => RecordKind::ExtendedSegmentAddress,
            0x03 => RecordKind::StartSegmentAddress,
            0x04 => RecordKind::ExtendedLinearAddress,
            0x05 => RecordKind::StartLinearAddress,
            other => RecordKind::Unknown(other),
        }
    }
}

/// Reasons a hex line fails to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// The line does not begin with ':'.
    #[error("missing ':' start code")]
    MissingStartCode,

    /// The line contains non-hex characters or an odd digit count.
    #[error("invalid hex digits")]
    InvalidHex,

    /// Fewer bytes than the fixed record header and checksum.
    #[error("record too short: {0} bytes")]
    TooShort(usize),

    /// Byte count field disagrees with the line length.
    #[error("byte count {declared} does not match {actual} data bytes")]
    LengthMismatch {
        /// Count from the record header.
        declared: usize,
        /// Data bytes actually present.
        actual: usize,
    },

    /// Record checksum does not verify.
    #[error("bad checksum: expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadChecksum {
        /// Checksum computed from the record contents.
        expected: u8,
        /// Checksum carried by the line.
        actual: u8,
    },
}

/// One decoded line of an Intel-HEX file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexRecord {
    /// Record type.
    pub kind: RecordKind,
    /// 16-bit load address.
    pub address: u16,
    /// Payload bytes.
    pub data: Vec<u8>,
}

impl HexRecord {
    /// Parse a single line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let body = line
            .trim()
            .strip_prefix(':')
            .ok_or(RecordError::MissingStartCode)?;
        let bytes = hex::decode(body).map_err(|_| RecordError::InvalidHex)?;

        // count + address(2) + type + checksum
        if bytes.len() < 5 {
            return Err(RecordError::TooShort(bytes.len()));
        }

        let declared = bytes[0] as usize;
        let actual = bytes.len() - 5;
        if declared != actual {
            return Err(RecordError::LengthMismatch { declared, actual });
        }

        let (content, checksum) = bytes.split_at(bytes.len() - 1);
        let expected = content
            .iter()
            .fold(0u8, |sum, &b| sum.wrapping_add(b))
            .wrapping_neg();
        if expected != checksum[0] {
            return Err(RecordError::BadChecksum {
                expected,
                actual: checksum[0],
            });
        }

        Ok(HexRecord {
            kind: RecordKind::from(bytes[3]),
            address: u16::from_be_bytes([bytes[1], bytes[2]]),
            data: bytes[4..4 + declared].to_vec(),
        })
    }

    /// Whether this record carries image bytes.
    pub fn is_data(&self) -> bool {
        self.kind == RecordKind::Data
    }
}
