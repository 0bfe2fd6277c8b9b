//! Fixed-width record shapes.
//!
//! Each record is marshalled field by field in declaration order, integers
//! little-endian, so the layout never depends on how the compiler arranges
//! the struct in memory.
//!
//! ```text
//! FirmwareConfig   +------+---------+--------+-----+
//!                  | type | version | blocks | crc |
//!                  +------+---------+--------+-----+
//! FirmwareRequest  +------+---------+-------+
//!                  | type | version | block |
//!                  +------+---------+-------+
//! FirmwareData     +------+---------+-------+------------+
//!                  | type | version | block | data[0..16]|
//!                  +------+---------+-------+------------+
//! ```

use std::fmt;

use bytes::{Buf, BufMut, BytesMut};

use crate::{from_hex, to_hex, WireError, WireResult, BLOCK_SIZE, BOOTLOADER_CRC};

/// A fixed-width record that travels as a hex string.
pub trait Record: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Append the record's fields to `buf`.
    fn write_to(&self, buf: &mut BytesMut);

    /// Read the record from a buffer holding at least [`Record::SIZE`] bytes.
    fn read_from(buf: &mut &[u8]) -> Self;

    /// Serialize to raw bytes.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        self.write_to(&mut buf);
        buf.to_vec()
    }

    /// Deserialize from raw bytes; the slice must be exactly [`Record::SIZE`] long.
    fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        if bytes.len() != Self::SIZE {
            return Err(WireError::WrongLength {
                expected: Self::SIZE * 2,
                actual: bytes.len() * 2,
            });
        }
        let mut cursor = bytes;
        Ok(Self::read_from(&mut cursor))
    }

    /// Serialize to an uppercase hex string.
    fn encode(&self) -> String {
        to_hex(&self.to_bytes())
    }

    /// Deserialize from a hex string of exactly `2 * SIZE` digits.
    fn decode(input: &str) -> WireResult<Self> {
        let bytes = from_hex(input, Self::SIZE)?;
        let mut cursor = bytes.as_slice();
        Ok(Self::read_from(&mut cursor))
    }
}

// ============================================================================
// FirmwareConfig
// ============================================================================

/// Firmware configuration request/response.
///
/// Nodes send this shape when asking which firmware they should run; the
/// bridge answers with the same shape describing the resolved image. It is
/// also the shape of a staged bootloader command reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareConfig {
    /// Firmware type.
    pub firmware_type: u16,
    /// Firmware version.
    pub version: u16,
    /// Number of 16-byte blocks in the image.
    pub blocks: u16,
    /// CRC-16 of the padded image.
    pub crc: u16,
}

impl FirmwareConfig {
    /// Build a bootloader command reply.
    ///
    /// `command` lands in the type field and `value` in the version field;
    /// `blocks` is zero and `crc` carries the [`BOOTLOADER_CRC`] sentinel.
    pub fn bootloader(command: u16, value: u16) -> Self {
        FirmwareConfig {
            firmware_type: command,
            version: value,
            blocks: 0,
            crc: BOOTLOADER_CRC,
        }
    }

    /// Whether this record is a bootloader command reply.
    pub fn is_bootloader_reply(&self) -> bool {
        self.blocks == 0 && self.crc == BOOTLOADER_CRC
    }
}

impl Record for FirmwareConfig {
    const SIZE: usize = 8;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.firmware_type);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.blocks);
        buf.put_u16_le(self.crc);
    }

    fn read_from(buf: &mut &[u8]) -> Self {
        FirmwareConfig {
            firmware_type: buf.get_u16_le(),
            version: buf.get_u16_le(),
            blocks: buf.get_u16_le(),
            crc: buf.get_u16_le(),
        }
    }
}

impl fmt::Display for FirmwareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={}, version={}, blocks={}, crc={}",
            self.firmware_type, self.version, self.blocks, self.crc
        )
    }
}

// ============================================================================
// FirmwareRequest
// ============================================================================

/// Request for a single firmware block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirmwareRequest {
    /// Firmware type the node is flashing.
    pub firmware_type: u16,
    /// Firmware version the node is flashing.
    pub version: u16,
    /// Zero-based block index.
    pub block: u16,
}

impl Record for FirmwareRequest {
    const SIZE: usize = 6;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.firmware_type);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.block);
    }

    fn read_from(buf: &mut &[u8]) -> Self {
        FirmwareRequest {
            firmware_type: buf.get_u16_le(),
            version: buf.get_u16_le(),
            block: buf.get_u16_le(),
        }
    }
}

impl fmt::Display for FirmwareRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={}, version={}, block={}",
            self.firmware_type, self.version, self.block
        )
    }
}

// ============================================================================
// FirmwareData
// ============================================================================

/// One block of firmware data sent in reply to a [`FirmwareRequest`].
///
/// `data` normally holds exactly [`BLOCK_SIZE`] bytes. A block index past the
/// end of the image yields a shorter (possibly empty) `data`, which is encoded
/// verbatim; decoding always expects the full 22-byte record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FirmwareData {
    /// Firmware type being served.
    pub firmware_type: u16,
    /// Firmware version being served.
    pub version: u16,
    /// Zero-based block index.
    pub block: u16,
    /// Block contents.
    pub data: Vec<u8>,
}

impl FirmwareData {
    /// Build a data reply labelled with the resolved type and version.
    pub fn reply(firmware_type: u16, version: u16, block: u16, data: &[u8]) -> Self {
        FirmwareData {
            firmware_type,
            version,
            block,
            data: data.to_vec(),
        }
    }
}

impl Record for FirmwareData {
    const SIZE: usize = 6 + BLOCK_SIZE;

    fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.firmware_type);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.block);
        buf.extend_from_slice(&self.data);
    }

    fn read_from(buf: &mut &[u8]) -> Self {
        let firmware_type = buf.get_u16_le();
        let version = buf.get_u16_le();
        let block = buf.get_u16_le();
        let mut data = vec![0u8; BLOCK_SIZE];
        buf.copy_to_slice(&mut data);
        FirmwareData {
            firmware_type,
            version,
            block,
            data,
        }
    }
}
