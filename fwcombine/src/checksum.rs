//! Integrity footer checksum
//!
//! The bootloader recomputes this CRC over the application region at boot
//! and refuses to jump to the application on a mismatch, so the parameters
//! here must stay in lockstep with the bootloader firmware: reflected
//! polynomial 0xEDB88320, initial value 0xFFFFFFFF, final XOR 0xFFFFFFFF.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Compute the CRC-32/ISO-HDLC of `data`
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Encode a checksum the way the bootloader reads it back from flash
pub fn footer_bytes(crc: u32) -> [u8; 4] {
    crc.to_le_bytes()
}
