//! Protocol constants shared by the bootloader and the bridge.

/// Size of one firmware block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Sentinel placed in the `crc` field of a bootloader command reply.
pub const BOOTLOADER_CRC: u16 = 0xDA7A;

// ============================================================================
// Bootloader Commands
// ============================================================================

/// Erase the node's EEPROM.
pub const BOOTLOADER_CMD_ERASE_EEPROM: u16 = 0x01;
/// Assign a new node id (payload carries the id).
pub const BOOTLOADER_CMD_SET_NODE_ID: u16 = 0x02;
/// Assign a new parent id (payload carries the id).
pub const BOOTLOADER_CMD_SET_PARENT_ID: u16 = 0x03;

/// Human-readable name for a bootloader command code.
pub fn bootloader_command_name(command: u16) -> &'static str {
    match command {
        BOOTLOADER_CMD_ERASE_EEPROM => "erase-eeprom",
        BOOTLOADER_CMD_SET_NODE_ID => "set-node-id",
        BOOTLOADER_CMD_SET_PARENT_ID => "set-parent-id",
        _ => "unknown",
    }
}

/// Whether the command echoes a node-supplied id back in the `version` field.
pub fn bootloader_command_takes_id(command: u16) -> bool {
    command == BOOTLOADER_CMD_SET_NODE_ID || command == BOOTLOADER_CMD_SET_PARENT_ID
}
