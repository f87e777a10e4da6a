use super::registers::{CALIB_H_LEN, CALIB_TP_LEN};

/// Factory trim coefficients, read verbatim from the device.
///
/// Coefficient names follow the datasheet (`dig_T1` .. `dig_H6`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationRecord {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,

    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,

    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationRecord {
    /// Build the record from the two calibration blocks.
    ///
    /// `tp` holds registers 0x88..=0xA1 and `h` holds 0xE1..=0xE7. Multi-byte
    /// coefficients are little-endian. H4 and H5 are 12-bit values sharing
    /// register 0xE5: H4 = 0xE4[7:0] << 4 | 0xE5[3:0], H5 = 0xE6[7:0] << 4 | 0xE5[7:4],
    /// with the MSB byte taken as signed.
    pub fn from_registers(tp: &[u8; CALIB_TP_LEN], h: &[u8; CALIB_H_LEN]) -> Self {
        let u16_at = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let i16_at = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        Self {
            dig_t1: u16_at(0),
            dig_t2: i16_at(2),
            dig_t3: i16_at(4),

            dig_p1: u16_at(6),
            dig_p2: i16_at(8),
            dig_p3: i16_at(10),
            dig_p4: i16_at(12),
            dig_p5: i16_at(14),
            dig_p6: i16_at(16),
            dig_p7: i16_at(18),
            dig_p8: i16_at(20),
            dig_p9: i16_at(22),

            // tp[24] (0xA0) is reserved
            dig_h1: tp[25],
            dig_h2: i16::from_le_bytes([h[0], h[1]]),
            dig_h3: h[2],
            dig_h4: ((h[3] as i8 as i16) << 4) | (h[4] & 0x0F) as i16,
            dig_h5: ((h[5] as i8 as i16) << 4) | (h[4] >> 4) as i16,
            dig_h6: h[6] as i8,
        }
    }

    /// Inverse of [`from_registers`](Self::from_registers), used to seed
    /// simulated devices.
    pub fn to_registers(&self) -> ([u8; CALIB_TP_LEN], [u8; CALIB_H_LEN]) {
        let mut tp = [0u8; CALIB_TP_LEN];
        let words: [[u8; 2]; 12] = [
            self.dig_t1.to_le_bytes(),
            self.dig_t2.to_le_bytes(),
            self.dig_t3.to_le_bytes(),
            self.dig_p1.to_le_bytes(),
            self.dig_p2.to_le_bytes(),
            self.dig_p3.to_le_bytes(),
            self.dig_p4.to_le_bytes(),
            self.dig_p5.to_le_bytes(),
            self.dig_p6.to_le_bytes(),
            self.dig_p7.to_le_bytes(),
            self.dig_p8.to_le_bytes(),
            self.dig_p9.to_le_bytes(),
        ];
        for (i, word) in words.iter().enumerate() {
            tp[i * 2..i * 2 + 2].copy_from_slice(word);
        }
        tp[25] = self.dig_h1;

        let h4 = self.dig_h4 as u16;
        let h5 = self.dig_h5 as u16;
        let [h2_lsb, h2_msb] = self.dig_h2.to_le_bytes();
        let h = [
            h2_lsb,
            h2_msb,
            self.dig_h3,
            (h4 >> 4) as u8,
            ((h5 as u8 & 0x0F) << 4) | (h4 as u8 & 0x0F),
            (h5 >> 4) as u8,
            self.dig_h6 as u8,
        ];
        (tp, h)
    }
}
