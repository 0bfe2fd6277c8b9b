//! Firmware images and firmware resolution for the MySensors OTA bridge.
//!
//! - [`HexRecord`] parses single Intel-HEX lines.
//! - [`FirmwareImage`] folds a hex file into a padded, block-addressable image
//!   with a bootloader-compatible [`crc16`].
//! - [`FirmwareResolver`] picks the file a node should receive.
//! - [`FirmwareStore`] combines the two, optionally caching decoded images.
//!
//! ```no_run
//! use mysb_firmware::{FirmwareMapping, FirmwareStore, StoreOptions};
//!
//! let store = FirmwareStore::open(
//!     "/config/firmware",
//!     vec![FirmwareMapping::default_for(1, 1)],
//!     StoreOptions::default(),
//! );
//! let (resolved, image) = store.fetch("12", 1, 1)?;
//! println!("{} blocks, crc {:04X} ({})", image.blocks(), image.checksum(), resolved.source);
//! # Ok::<(), mysb_firmware::FirmwareError>(())
//! ```

mod cache;
mod checksum;
mod error;
mod ihex;
mod image;
mod mapping;
mod resolver;
mod store;

pub use cache::FileCache;
pub use checksum::{crc16, Crc16, CRC16_ALGORITHM};
pub use error::FirmwareError;
pub use ihex::{HexRecord, RecordError, RecordKind};
pub use image::{FirmwareImage, ImageBuilder, ParseMode, FILL_BYTE, PAGE_SIZE};
pub use mapping::{FirmwareMapping, DEFAULT_NODE_ID};
pub use resolver::{FirmwareResolver, FirmwareSource, ResolvedFirmware, FIRMWARE_FILE_NAME};
pub use store::{FirmwareStore, StoreOptions};

/// Result type for firmware operations.
pub type Result<T> = std::result::Result<T, FirmwareError>;
