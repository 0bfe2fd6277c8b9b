//! Image decoding against the checked-in firmware fixture.

use mysb_firmware::{crc16, Crc16, FirmwareImage, ParseMode, FILL_BYTE, PAGE_SIZE};

const FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/firmware/1/1/firmware.hex"
);

fn fixture() -> FirmwareImage {
    FirmwareImage::load(FIXTURE).expect("fixture should load")
}

#[test]
fn test_fixture_blocks_and_checksum() {
    let image = fixture();
    assert_eq!(image.blocks(), 80);
    assert_eq!(image.checksum(), 18132);
    assert_eq!(image.len(), 80 * 16);
    assert_eq!(image.len() % PAGE_SIZE, 0);
    assert_eq!(image.start_address(), 0);
}

#[test]
fn test_fixture_checksum_matches_data() {
    let image = fixture();
    assert_eq!(crc16(image.data()), image.checksum());
}

#[test]
fn test_fixture_checksum_streamed_by_block() {
    let image = fixture();
    let mut crc = Crc16::new();
    for block in image.iter_blocks() {
        crc.update(block);
    }
    assert_eq!(crc.value(), 18132);
}

#[test]
fn test_fixture_known_blocks() {
    let image = fixture();
    assert_eq!(
        hex::encode_upper(&image[0]),
        "0C945C000C946E000C946E000C946E00"
    );
    assert_eq!(
        hex::encode_upper(&image[1]),
        "0C946E000C946E000C946E000C946E00"
    );
    assert_eq!(
        hex::encode_upper(&image[78]),
        "923D8367BADD857A7931C794D45352F9"
    );
}

#[test]
fn test_fixture_address_gap_is_unprogrammed() {
    let image = fixture();
    // 0x0400..0x0420 is absent from the hex file.
    assert!(image[64].iter().all(|&b| b == FILL_BYTE));
    assert!(image[65].iter().all(|&b| b == FILL_BYTE));
    assert_ne!(image[66], [FILL_BYTE; 16][..]);
}

#[test]
fn test_fixture_tail_padding() {
    let image = fixture();
    assert!(image[79].iter().all(|&b| b == FILL_BYTE));
}

#[test]
fn test_every_block_in_range_is_sixteen_bytes() {
    let image = fixture();
    for index in 0..image.blocks() {
        assert_eq!(image.block(index).len(), 16, "block {}", index);
    }
    assert!(image.block(image.blocks()).is_empty());
}

#[test]
fn test_reload_is_deterministic() {
    let first = fixture();
    let second = fixture();
    assert_eq!(
        (first.blocks(), first.checksum()),
        (second.blocks(), second.checksum())
    );
    assert_eq!(first, second);
}

#[test]
fn test_fixture_loads_strictly() {
    let image = FirmwareImage::load_with(FIXTURE, ParseMode::Strict).unwrap();
    assert_eq!(image, fixture());
}

#[test]
fn test_corrupt_line_lenient_vs_strict() {
    let mut text = std::fs::read_to_string(FIXTURE).unwrap();
    text.insert_str(0, ":0400000001020304FF\n");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("firmware.hex");
    std::fs::write(&path, &text).unwrap();

    let lenient = FirmwareImage::load(&path).unwrap();
    assert_eq!(lenient, fixture());

    let err = FirmwareImage::load_with(&path, ParseMode::Strict).unwrap_err();
    assert!(err.to_string().contains("line 1"), "{}", err);
}
