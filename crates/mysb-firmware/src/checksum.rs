//! Streaming CRC-16 used by the MySensors bootloader.
//!
//! Reflected polynomial 0xA001 (0x8005 unreflected), initial value 0xFFFF, no
//! final XOR. The `crc` catalogue names this parameter set CRC-16/MODBUS. The
//! bootloader recomputes it over flash after an update, so it must match bit
//! for bit.

use crc::{Algorithm, Crc, Digest, CRC_16_MODBUS};

/// Parameter set of the bootloader checksum.
pub const CRC16_ALGORITHM: &Algorithm<u16> = &CRC_16_MODBUS;

static CRC16: Crc<u16> = Crc::<u16>::new(CRC16_ALGORITHM);

/// Incremental CRC-16 state.
#[derive(Clone)]
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc16")
            .field("value", &format_args!("0x{:04X}", self.value()))
            .finish()
    }
}

impl Crc16 {
    /// Start a new checksum.
    pub fn new() -> Self {
        Crc16 {
            digest: CRC16.digest(),
        }
    }

    /// Fold one byte into the checksum.
    pub fn push(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    /// Fold a slice into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Current checksum value.
    pub fn value(&self) -> u16 {
        self.digest.clone().finalize()
    }
}

/// Checksum a complete buffer.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}
