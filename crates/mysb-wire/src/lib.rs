//! MySensors Bootloader OTA Wire Codec
//!
//! This crate provides the record types exchanged between sensor nodes running
//! the MySensors bootloader and the OTA bridge. Every record travels over the
//! message bus as an uppercase hex string, two digits per byte, no separators.
//!
//! # Record Shapes
//!
//! All integer fields are little-endian `u16`, serialized in declaration order:
//!
//! | Record                  | Fields                            | Size (bytes) |
//! |-------------------------|-----------------------------------|--------------|
//! | [`FirmwareConfig`]      | type, version, blocks, crc        | 8            |
//! | [`FirmwareRequest`]     | type, version, block              | 6            |
//! | [`FirmwareData`]        | type, version, block, data\[16\]  | 22           |
//!
//! Bootloader command replies reuse the [`FirmwareConfig`] shape with
//! `blocks = 0` and `crc = 0xDA7A` (see [`FirmwareConfig::bootloader`]).
//! Id responses are not records at all, just a decimal string
//! (see [`encode_id`]).
//!
//! # Example
//!
//! ```rust
//! use mysb_wire::{FirmwareConfig, Record};
//!
//! let config = FirmwareConfig::decode("010001005000D446")?;
//! assert_eq!(config.blocks, 80);
//! assert_eq!(config.crc, 18132);
//! assert_eq!(config.encode(), "010001005000D446");
//! # Ok::<(), mysb_wire::WireError>(())
//! ```

mod constants;
mod error;
mod hex_string;
mod records;

pub use constants::*;
pub use error::*;
pub use hex_string::*;
pub use records::*;
