//! Record checksum
//!
//! CRC-32/MPEG-2: polynomial 0x04C11DB7, not reflected, initial value
//! 0xFFFFFFFF, no final xor.

use crc::{CRC_32_MPEG_2, Crc};

const RECORD_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

pub fn checksum(data: &[u8]) -> u32 {
    RECORD_CRC.checksum(data)
}
