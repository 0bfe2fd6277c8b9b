//! In-memory firmware images.
//!
//! A [`FirmwareImage`] is the flat, padded byte stream the bootloader writes to
//! flash, cut into 16-byte blocks. It is built by folding the data records of
//! an Intel-HEX file through an [`ImageBuilder`]:
//!
//! - the first data record fixes the start address;
//! - a record starting past the current end address is preceded by 0xFF fill
//!   (unprogrammed flash) up to its address;
//! - the finished buffer is padded with 0xFF to a whole number of 128-byte
//!   flash pages.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Index;
use std::path::Path;

use mysb_wire::BLOCK_SIZE;

use crate::checksum::crc16;
use crate::ihex::HexRecord;
use crate::{FirmwareError, Result};

/// Flash page size the image is padded to.
pub const PAGE_SIZE: usize = 128;

/// Value of unprogrammed flash.
pub const FILL_BYTE: u8 = 0xFF;

/// How to treat hex lines that fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Skip malformed lines with a warning.
    #[default]
    Lenient,
    /// Fail the whole load on the first malformed line.
    Strict,
}

/// Running address window of the data seen so far.
#[derive(Debug, Clone, Copy)]
struct AddressCursor {
    start: u32,
    end: u32,
}

/// Accumulates data records into a padded image buffer.
#[derive(Debug, Default)]
pub struct ImageBuilder {
    cursor: Option<AddressCursor>,
    buffer: Vec<u8>,
}

impl ImageBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the image. Non-data records are ignored.
    pub fn push(&mut self, record: &HexRecord) {
        if !record.is_data() {
            return;
        }

        let address = u32::from(record.address);
        let cursor = self.cursor.get_or_insert(AddressCursor {
            start: address,
            end: address,
        });

        if address > cursor.end {
            let gap = (address - cursor.end) as usize;
            self.buffer.resize(self.buffer.len() + gap, FILL_BYTE);
            cursor.end = address;
        }

        self.buffer.extend_from_slice(&record.data);
        cursor.end += record.data.len() as u32;
    }

    /// Number of bytes accumulated so far (before page padding).
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no data has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Pad to a page boundary and compute block count and checksum.
    pub fn finish(self) -> Result<FirmwareImage> {
        let start_address = self.cursor.map_or(0, |c| c.start);
        FirmwareImage::from_parts(start_address, self.buffer)
    }
}

/// A decoded, padded, checksummed firmware image.
///
/// Invariant: `data().len() == blocks() as usize * BLOCK_SIZE`, and the length
/// is a whole number of [`PAGE_SIZE`] pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    start_address: u32,
    blocks: u16,
    checksum: u16,
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Build an image from raw binary that starts at `start_address`.
    ///
    /// The binary is padded with [`FILL_BYTE`] to a page boundary.
    ///
    /// Padding is measured from the length of `data`, not the absolute end
    /// address, and an already aligned binary gains no extra page. Older
    /// bridges always append `128 - end % 128` bytes, so for aligned input they
    /// report one more page (8 blocks) and a different checksum.
    pub fn from_parts(start_address: u32, mut data: Vec<u8>) -> Result<Self> {
        let remainder = data.len() % PAGE_SIZE;
        if remainder != 0 {
            data.resize(data.len() + PAGE_SIZE - remainder, FILL_BYTE);
        }

        let block_count = data.len() / BLOCK_SIZE;
        let blocks = u16::try_from(block_count).map_err(|_| FirmwareError::TooLarge {
            blocks: block_count,
            max: u16::MAX as usize,
        })?;

        Ok(FirmwareImage {
            start_address,
            blocks,
            checksum: crc16(&data),
            data,
        })
    }

    /// Load an Intel-HEX file, skipping malformed lines.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, ParseMode::Lenient)
    }

    /// Load an Intel-HEX file with the given parse mode.
    pub fn load_with(path: impl AsRef<Path>, mode: ParseMode) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FirmwareError::NotFound {
                path: path.to_path_buf(),
            },
            _ => FirmwareError::Io(e),
        })?;

        let image = Self::from_reader(BufReader::new(file), mode)?;
        log::debug!(
            "Loaded {}: {} blocks, crc 0x{:04X}",
            path.display(),
            image.blocks,
            image.checksum
        );
        Ok(image)
    }

    /// Decode an Intel-HEX stream line by line.
    pub fn from_reader<R: BufRead>(reader: R, mode: ParseMode) -> Result<Self> {
        let mut builder = ImageBuilder::new();

        for (index, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            let line_no = index + 1;

            let parsed = std::str::from_utf8(&line)
                .map_err(|_| "line is not valid UTF-8".to_string())
                .and_then(|text| {
                    if text.trim().is_empty() {
                        Ok(None)
                    } else {
                        HexRecord::parse(text).map(Some).map_err(|e| e.to_string())
                    }
                });

            match parsed {
                Ok(Some(record)) => builder.push(&record),
                Ok(None) => {}
                Err(reason) => match mode {
                    ParseMode::Strict => {
                        return Err(FirmwareError::CorruptRecord {
                            line: line_no,
                            reason,
                        });
                    }
                    ParseMode::Lenient => {
                        log::warn!("Skipping hex line {}: {}", line_no, reason);
                    }
                },
            }
        }

        builder.finish()
    }

    /// Number of 16-byte blocks.
    pub fn blocks(&self) -> u16 {
        self.blocks
    }

    /// CRC-16 over the padded image.
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Address of the first data byte in the source file.
    pub fn start_address(&self) -> u32 {
        self.start_address
    }

    /// The padded image bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Image length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Contents of block `index`.
    ///
    /// Indices at or past [`FirmwareImage::blocks`] yield an empty slice
    /// instead of panicking.
    pub fn block(&self, index: u16) -> &[u8] {
        let start = (index as usize * BLOCK_SIZE).min(self.data.len());
        let end = (start + BLOCK_SIZE).min(self.data.len());
        &self.data[start..end]
    }

    /// Iterate over all blocks in order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks(BLOCK_SIZE)
    }
}

impl Index<u16> for FirmwareImage {
    type Output = [u8];

    fn index(&self, index: u16) -> &[u8] {
        self.block(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_record(address: u16, data: &[u8]) -> HexRecord {
        HexRecord {
            kind: crate::RecordKind::Data,
            address,
            data: data.to_vec(),
        }
    }

    #[test]
    fn test_empty_builder() {
        let image = ImageBuilder::new().finish().unwrap();
        assert_eq!(image.blocks(), 0);
        assert_eq!(image.checksum(), 0xFFFF);
        assert!(image.is_empty());
        assert!(image.block(0).is_empty());
    }

    #[test]
    fn test_pads_to_page() {
        let mut builder = ImageBuilder::new();
        builder.push(&data_record(0, &[0xAA; 20]));
        let image = builder.finish().unwrap();

        assert_eq!(image.len(), PAGE_SIZE);
        assert_eq!(image.blocks(), 8);
        assert_eq!(&image.data()[..20], &[0xAA; 20]);
        assert!(image.data()[20..].iter().all(|&b| b == FILL_BYTE));
    }

    #[test]
    fn test_page_aligned_input_gets_no_extra_page() {
        let mut builder = ImageBuilder::new();
        builder.push(&data_record(0, &[0x11; PAGE_SIZE]));
        let image = builder.finish().unwrap();
        assert_eq!(image.len(), PAGE_SIZE);
        assert_eq!(image.blocks(), 8);
    }

    #[test]
    fn test_gap_is_filled() {
        let mut builder = ImageBuilder::new();
        builder.push(&data_record(0x0000, &[1, 2, 3, 4]));
        builder.push(&data_record(0x0010, &[5, 6]));
        assert_eq!(builder.len(), 0x12);

        let image = builder.finish().unwrap();
        assert_eq!(&image.data()[..4], &[1, 2, 3, 4]);
        assert!(image.data()[4..16].iter().all(|&b| b == FILL_BYTE));
        assert_eq!(&image.block(1)[..2], &[5, 6]);
    }

    #[test]
    fn test_start_address_is_first_data_record() {
        let mut builder = ImageBuilder::new();
        builder.push(&HexRecord {
            kind: crate::RecordKind::ExtendedSegmentAddress,
            address: 0,
            data: vec![0, 0],
        });
        builder.push(&data_record(0x7000, &[9; 16]));
        builder.push(&data_record(0x7010, &[8; 16]));
        let image = builder.finish().unwrap();

        assert_eq!(image.start_address(), 0x7000);
        // No fill between address 0 and the first record.
        assert_eq!(image.block(0), &[9; 16]);
        assert_eq!(image.block(1), &[8; 16]);
    }

    #[test]
    fn test_every_block_is_full_width() {
        let mut builder = ImageBuilder::new();
        builder.push(&data_record(0, &[0x42; 300]));
        let image = builder.finish().unwrap();

        for index in 0..image.blocks() {
            assert_eq!(image[index].len(), BLOCK_SIZE);
        }
        assert_eq!(image.iter_blocks().count(), image.blocks() as usize);
    }

    #[test]
    fn test_block_out_of_range_is_empty() {
        let image = FirmwareImage::from_parts(0, vec![0u8; 32]).unwrap();
        assert_eq!(image.block(image.blocks() - 1).len(), BLOCK_SIZE);
        assert!(image.block(image.blocks()).is_empty());
        assert!(image.block(u16::MAX).is_empty());
    }

    #[test]
    fn test_checksum_covers_padding() {
        let image = FirmwareImage::from_parts(0, vec![0u8; 4]).unwrap();
        let mut expected = vec![0u8; 4];
        expected.resize(PAGE_SIZE, FILL_BYTE);
        assert_eq!(image.checksum(), crc16(&expected));
    }

    #[test]
    fn test_too_large() {
        let data = vec![0u8; (u16::MAX as usize + 1) * BLOCK_SIZE];
        match FirmwareImage::from_parts(0, data) {
            Err(FirmwareError::TooLarge { blocks, .. }) => assert_eq!(blocks, 65536),
            other => panic!("expected TooLarge, got {:?}", other.map(|i| i.blocks())),
        }
    }

    #[test]
    fn test_from_reader_lenient_skips_bad_lines() {
        let text = "\
:100000000102030405060708090A0B0C0D0E0F1068
garbage
:10001000FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF0

:00000001FF
";
        let image = FirmwareImage::from_reader(text.as_bytes(), ParseMode::Lenient).unwrap();
        assert_eq!(image.blocks(), 8);
        assert_eq!(image.block(0), &(1u8..=16).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn test_from_reader_strict_rejects_bad_lines() {
        let text = ":100000000102030405060708090A0B0C0D0E0F1068\ngarbage\n";
        match FirmwareImage::from_reader(text.as_bytes(), ParseMode::Strict) {
            Err(FirmwareError::CorruptRecord { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected CorruptRecord, got {:?}", other.map(|i| i.blocks())),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = FirmwareImage::load("/nonexistent/firmware.hex").unwrap_err();
        assert!(matches!(err, FirmwareError::NotFound { .. }));
    }
}
