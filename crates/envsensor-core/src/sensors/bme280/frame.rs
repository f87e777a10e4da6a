/// Length of the output block 0xF7..=0xFE.
pub const FRAME_LEN: usize = 8;

/// Raw output registers from one burst read.
///
/// The burst covers all three channels so they come from the same data
/// snapshot. Frames are never stored; they go straight to compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    /// press_msb << 16 | press_lsb << 8 | press_xlsb
    pub pressure: u32,
    /// temp_msb << 16 | temp_lsb << 8 | temp_xlsb
    pub temperature: u32,
    /// hum_msb << 8 | hum_lsb
    pub humidity: u32,
}

impl RawFrame {
    /// Unpack the output block read starting at press_msb (0xF7).
    pub const fn decode(bytes: &[u8; FRAME_LEN]) -> Self {
        Self {
            pressure: (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32,
            temperature: (bytes[3] as u32) << 16 | (bytes[4] as u32) << 8 | bytes[5] as u32,
            humidity: (bytes[6] as u32) << 8 | bytes[7] as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bme280::compensation::{SKIPPED_H_CODE, SKIPPED_TP_CODE};

    #[test]
    fn test_decode_literal_block() {
        let frame = RawFrame::decode(&[0x50, 0x00, 0x00, 0x80, 0x00, 0x00, 0x7F, 0xFF]);
        assert_eq!(frame.pressure, 0x50_0000);
        assert_eq!(frame.temperature, 0x80_0000);
        assert_eq!(frame.temperature, SKIPPED_TP_CODE);
        assert_eq!(frame.humidity, 0x7FFF);
    }

    #[test]
    fn test_decode_byte_order() {
        let frame = RawFrame::decode(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x80, 0x00]);
        assert_eq!(frame.pressure, 0x65_5AC0);
        assert_eq!(frame.temperature, 0x7E_ED00);
        assert_eq!(frame.humidity, SKIPPED_H_CODE);
    }
}
