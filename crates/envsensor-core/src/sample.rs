//! Compensated sensor samples and their engineering units

use core::fmt;
use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Marker stored in a channel that was not measured.
pub const DISABLED: i32 = i32::MAX;

/// Longest line `SensorSample::to_line` can produce.
pub const LINE_CAPACITY: usize = 96;

/// One compensated reading in the compensation engine's native fixed-point units:
///
/// - `temperature`: 1/25600 °C (`t_fine * 5 + 128`)
/// - `pressure`: Pa in Q24.8
/// - `humidity`: %RH in Q22.10
///
/// Any channel may hold [`DISABLED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorSample {
    pub temperature: i32,
    pub pressure: i32,
    pub humidity: i32,
}

impl SensorSample {
    /// Bytes per sample in the retained record.
    pub const ENCODED_LEN: usize = 12;

    pub const fn disabled() -> Self {
        Self {
            temperature: DISABLED,
            pressure: DISABLED,
            humidity: DISABLED,
        }
    }

    /// Temperature in milli-degrees Celsius.
    pub const fn milli_celsius(&self) -> Option<i32> {
        if self.temperature == DISABLED {
            return None;
        }
        Some(((self.temperature as i64 * 10) >> 8) as i32)
    }

    /// Pressure in hundredths of a pascal.
    pub const fn centi_pascal(&self) -> Option<i32> {
        if self.pressure == DISABLED {
            return None;
        }
        Some(((self.pressure as i64 * 25) >> 6) as i32)
    }

    /// Relative humidity in hundredths of a percent, `0..=10000`.
    pub const fn centi_percent(&self) -> Option<i32> {
        if self.humidity == DISABLED {
            return None;
        }
        Some(((self.humidity as i64 * 100) >> 10) as i32)
    }

    pub fn to_le_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut bytes = [0u8; Self::ENCODED_LEN];
        bytes[0..4].copy_from_slice(&self.temperature.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.pressure.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.humidity.to_le_bytes());
        bytes
    }

    pub fn from_le_bytes(bytes: &[u8; Self::ENCODED_LEN]) -> Self {
        let word = |i: usize| i32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Self {
            temperature: word(0),
            pressure: word(4),
            humidity: word(8),
        }
    }

    /// The display line as an owned fixed-capacity string.
    pub fn to_line(&self) -> heapless::String<LINE_CAPACITY> {
        let mut line = heapless::String::new();
        // Cannot overflow: three fields of at most 11 digits plus labels.
        let _ = write!(line, "{}", self);
        line
    }
}

/// `value / 10^decimals` with the sign kept for values between -1 and 0.
struct Fixed {
    value: i32,
    decimals: u32,
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10i64.pow(self.decimals);
        let value = self.value as i64;
        let sign = if value < 0 { "-" } else { "" };
        let magnitude = value.abs();
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / scale,
            magnitude % scale,
            width = self.decimals as usize
        )
    }
}

/// `temperature=25.087,pressure=100653.25,humidity=54.99`
///
/// Disabled channels are left out.
impl fmt::Display for SensorSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("temperature", self.milli_celsius(), 3),
            ("pressure", self.centi_pascal(), 2),
            ("humidity", self.centi_percent(), 2),
        ];
        let mut first = true;
        for (name, value, decimals) in fields {
            let Some(value) = value else { continue };
            if !first {
                f.write_str(",")?;
            }
            first = false;
            write!(f, "{}={}", name, Fixed { value, decimals })?;
        }
        Ok(())
    }
}
