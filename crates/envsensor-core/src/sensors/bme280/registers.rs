//! BME280 register map and control-register encodings
//!
//! The three control registers are packed bit fields. Each one is modelled as
//! a plain struct with explicit `encode`/`decode` over `u8` so the layout never
//! depends on how a compiler orders bit fields.

use serde::{Deserialize, Serialize};

pub const REG_CALIB_T1: u8 = 0x88;
/// 0x88..=0xA1: T1..T3, P1..P9, one reserved byte, H1
pub const CALIB_TP_LEN: usize = 26;
pub const REG_CALIB_H2: u8 = 0xE1;
/// 0xE1..=0xE7: H2..H6
pub const CALIB_H_LEN: usize = 7;

pub const REG_CHIP_ID: u8 = 0xD0;
pub const REG_SOFT_RESET: u8 = 0xE0;
pub const REG_CTRL_HUM: u8 = 0xF2;
pub const REG_STATUS: u8 = 0xF3;
pub const REG_CTRL_MEAS: u8 = 0xF4;
pub const REG_CONFIG: u8 = 0xF5;
pub const REG_PRESS_MSB: u8 = 0xF7;
pub const REG_TEMP_MSB: u8 = 0xFA;
pub const REG_HUM_MSB: u8 = 0xFD;

pub const BME280_CHIP_ID: u8 = 0x60;
pub const SOFT_RESET_COMMAND: u8 = 0xB6;

/// im_update: NVM calibration data is being copied into the image registers
pub const STATUS_IM_UPDATE_BIT: u8 = 0;
/// measuring: a conversion is running
pub const STATUS_MEASURING_BIT: u8 = 3;

/// Oversampling setting for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Oversampling {
    /// Channel disabled; its output reads as the "disabled" sentinel.
    Skipped,
    X1,
    X2,
    X4,
    X8,
    X16,
}

impl Oversampling {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Skipped => 0b000,
            Self::X1 => 0b001,
            Self::X2 => 0b010,
            Self::X4 => 0b011,
            Self::X8 => 0b100,
            Self::X16 => 0b101,
        }
    }

    /// 101 and above all mean x16.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::Skipped,
            0b001 => Self::X1,
            0b010 => Self::X2,
            0b011 => Self::X4,
            0b100 => Self::X8,
            _ => Self::X16,
        }
    }
}

/// Device power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Sleep,
    /// One conversion, then back to sleep.
    Forced,
    /// Continuous conversions separated by the standby time.
    Normal,
}

impl Mode {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Sleep => 0b00,
            Self::Forced => 0b01,
            Self::Normal => 0b11,
        }
    }

    /// Both 01 and 10 select forced mode.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Sleep,
            0b11 => Self::Normal,
            _ => Self::Forced,
        }
    }
}

/// IIR filter coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Off,
    X2,
    X4,
    X8,
    X16,
}

impl Filter {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Off => 0b000,
            Self::X2 => 0b001,
            Self::X4 => 0b010,
            Self::X8 => 0b011,
            Self::X16 => 0b100,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::Off,
            0b001 => Self::X2,
            0b010 => Self::X4,
            0b011 => Self::X8,
            _ => Self::X16,
        }
    }
}

/// Inactive time between conversions in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandbyDuration {
    Ms0_5,
    Ms10,
    Ms20,
    Ms62_5,
    Ms125,
    Ms250,
    Ms500,
    Ms1000,
}

impl StandbyDuration {
    pub const fn bits(self) -> u8 {
        match self {
            Self::Ms0_5 => 0b000,
            Self::Ms62_5 => 0b001,
            Self::Ms125 => 0b010,
            Self::Ms250 => 0b011,
            Self::Ms500 => 0b100,
            Self::Ms1000 => 0b101,
            Self::Ms10 => 0b110,
            Self::Ms20 => 0b111,
        }
    }

    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::Ms0_5,
            0b001 => Self::Ms62_5,
            0b010 => Self::Ms125,
            0b011 => Self::Ms250,
            0b100 => Self::Ms500,
            0b101 => Self::Ms1000,
            0b110 => Self::Ms10,
            _ => Self::Ms20,
        }
    }
}

/// ctrl_hum (0xF2): humidity oversampling in bits 2..0.
///
/// Only takes effect after the next write to ctrl_meas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlHum {
    pub osrs_h: Oversampling,
}

impl CtrlHum {
    pub const OSRS_H_SHIFT: u8 = 0;
    pub const OSRS_H_MASK: u8 = 0b111;

    pub const fn encode(self) -> u8 {
        (self.osrs_h.bits() & Self::OSRS_H_MASK) << Self::OSRS_H_SHIFT
    }

    pub const fn decode(value: u8) -> Self {
        Self {
            osrs_h: Oversampling::from_bits((value >> Self::OSRS_H_SHIFT) & Self::OSRS_H_MASK),
        }
    }
}

/// ctrl_meas (0xF4): osrs_t in 7..5, osrs_p in 4..2, mode in 1..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CtrlMeas {
    pub osrs_t: Oversampling,
    pub osrs_p: Oversampling,
    pub mode: Mode,
}

impl CtrlMeas {
    pub const OSRS_T_SHIFT: u8 = 5;
    pub const OSRS_P_SHIFT: u8 = 2;
    pub const MODE_SHIFT: u8 = 0;
    pub const OSRS_MASK: u8 = 0b111;
    pub const MODE_MASK: u8 = 0b11;

    /// Everything skipped, sleep mode: the word written before reconfiguring.
    pub const SLEEP: Self = Self {
        osrs_t: Oversampling::Skipped,
        osrs_p: Oversampling::Skipped,
        mode: Mode::Sleep,
    };

    pub const fn encode(self) -> u8 {
        ((self.osrs_t.bits() & Self::OSRS_MASK) << Self::OSRS_T_SHIFT)
            | ((self.osrs_p.bits() & Self::OSRS_MASK) << Self::OSRS_P_SHIFT)
            | ((self.mode.bits() & Self::MODE_MASK) << Self::MODE_SHIFT)
    }

    pub const fn decode(value: u8) -> Self {
        Self {
            osrs_t: Oversampling::from_bits((value >> Self::OSRS_T_SHIFT) & Self::OSRS_MASK),
            osrs_p: Oversampling::from_bits((value >> Self::OSRS_P_SHIFT) & Self::OSRS_MASK),
            mode: Mode::from_bits((value >> Self::MODE_SHIFT) & Self::MODE_MASK),
        }
    }
}

/// config (0xF5): t_sb in 7..5, filter in 4..2, bit 1 reserved, spi3w_en in bit 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRegister {
    pub standby: StandbyDuration,
    pub filter: Filter,
    pub spi3w_en: bool,
}

impl ConfigRegister {
    pub const T_SB_SHIFT: u8 = 5;
    pub const FILTER_SHIFT: u8 = 2;
    pub const SPI3W_EN_SHIFT: u8 = 0;
    pub const FIELD_MASK: u8 = 0b111;

    pub const fn encode(self) -> u8 {
        ((self.standby.bits() & Self::FIELD_MASK) << Self::T_SB_SHIFT)
            | ((self.filter.bits() & Self::FIELD_MASK) << Self::FILTER_SHIFT)
            | ((self.spi3w_en as u8) << Self::SPI3W_EN_SHIFT)
    }

    pub const fn decode(value: u8) -> Self {
        Self {
            standby: StandbyDuration::from_bits((value >> Self::T_SB_SHIFT) & Self::FIELD_MASK),
            filter: Filter::from_bits((value >> Self::FILTER_SHIFT) & Self::FIELD_MASK),
            spi3w_en: ((value >> Self::SPI3W_EN_SHIFT) & 1) != 0,
        }
    }
}

/// status (0xF3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub measuring: bool,
    pub im_update: bool,
}

impl Status {
    pub const fn decode(value: u8) -> Self {
        Self {
            measuring: (value & (1 << STATUS_MEASURING_BIT)) != 0,
            im_update: (value & (1 << STATUS_IM_UPDATE_BIT)) != 0,
        }
    }
}

/// Complete sampling setup: what `set_sampling` programs into the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub mode: Mode,
    pub temperature: Oversampling,
    pub pressure: Oversampling,
    pub humidity: Oversampling,
    pub filter: Filter,
    pub standby: StandbyDuration,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            temperature: Oversampling::X16,
            pressure: Oversampling::X16,
            humidity: Oversampling::X16,
            filter: Filter::Off,
            standby: StandbyDuration::Ms0_5,
        }
    }
}

impl SamplingConfig {
    pub const fn ctrl_hum(&self) -> CtrlHum {
        CtrlHum {
            osrs_h: self.humidity,
        }
    }

    pub const fn ctrl_meas(&self) -> CtrlMeas {
        CtrlMeas {
            osrs_t: self.temperature,
            osrs_p: self.pressure,
            mode: self.mode,
        }
    }

    pub const fn config(&self) -> ConfigRegister {
        ConfigRegister {
            standby: self.standby,
            filter: self.filter,
            spi3w_en: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampling_words() {
        let sampling = SamplingConfig::default();
        assert_eq!(sampling.ctrl_hum().encode(), 0b101);
        // osrs_t=101, osrs_p=101, mode=11
        assert_eq!(sampling.ctrl_meas().encode(), 0b1011_0111);
        assert_eq!(sampling.config().encode(), 0x00);
    }

    #[test]
    fn test_config_register_bit_positions() {
        let reg = ConfigRegister {
            standby: StandbyDuration::Ms1000,
            filter: Filter::X16,
            spi3w_en: true,
        };
        assert_eq!(reg.encode(), (0b101 << 5) | (0b100 << 2) | 1);
        assert_eq!(ConfigRegister::decode(reg.encode()), reg);
    }

    #[test]
    fn test_ctrl_meas_decode_upper_codes() {
        // 111 oversampling and 10 mode are aliases.
        let decoded = CtrlMeas::decode(0b1111_1110);
        assert_eq!(decoded.osrs_t, Oversampling::X16);
        assert_eq!(decoded.osrs_p, Oversampling::X16);
        assert_eq!(decoded.mode, Mode::Forced);
    }

    #[test]
    fn test_ctrl_hum_ignores_reserved_bits() {
        assert_eq!(CtrlHum::decode(0b1111_1010).osrs_h, Oversampling::X2);
    }

    #[test]
    fn test_sleep_word_is_zero() {
        assert_eq!(CtrlMeas::SLEEP.encode(), 0);
    }

    #[test]
    fn test_status_bits() {
        assert_eq!(
            Status::decode(0b0000_1001),
            Status {
                measuring: true,
                im_update: true
            }
        );
        assert!(!Status::decode(0b1111_0110).im_update);
    }
}
