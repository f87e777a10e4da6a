//! Bosch fixed-point compensation
//!
//! Integer formulas from the BME280 datasheet (section 4.2.3 and 8.2), with
//! the same shift amounts and intermediate widths: 32-bit for temperature and
//! humidity, 64-bit for pressure. All intermediate arithmetic wraps the way
//! the reference C code does on a 32-bit MCU, so no input can panic.
//!
//! Raw codes are the register values as assembled by
//! [`RawFrame`](super::frame::RawFrame): temperature and pressure are 24-bit
//! words holding the 20-bit ADC value in bits 23..4, humidity is 16-bit.

use super::calibration::CalibrationRecord;
use super::frame::RawFrame;
use crate::sample::{DISABLED, SensorSample};

/// Temperature/pressure register code when the channel is skipped.
pub const SKIPPED_TP_CODE: u32 = 0x80_0000;
/// Humidity register code when the channel is skipped.
pub const SKIPPED_H_CODE: u32 = 0x8000;

/// Upper clamp for the humidity intermediate: 100 %RH in Q22.10, before `>> 12`.
pub const HUMIDITY_INTERMEDIATE_MAX: i32 = 419_430_400;

/// High-resolution temperature carried from temperature compensation into
/// pressure and humidity compensation of the same reading.
///
/// Only [`CalibrationRecord::compensate_temperature`] produces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FineTemperature(i32);

impl FineTemperature {
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl CalibrationRecord {
    /// Compensated temperature in 1/25600 °C (`t_fine * 5 + 128`).
    ///
    /// `>> 8` of the result is the datasheet's centi-degree value. A skipped
    /// channel returns [`DISABLED`] and no fine temperature.
    pub fn compensate_temperature(&self, raw: u32) -> (i32, Option<FineTemperature>) {
        if raw == SKIPPED_TP_CODE {
            return (DISABLED, None);
        }
        let adc_t = (raw >> 4) as i32;
        let t1 = self.dig_t1 as i32;
        let t2 = self.dig_t2 as i32;
        let t3 = self.dig_t3 as i32;

        let var1 = ((adc_t >> 3) - (t1 << 1)).wrapping_mul(t2) >> 11;
        let delta = (adc_t >> 4) - t1;
        let var2 = ((delta.wrapping_mul(delta) >> 12).wrapping_mul(t3)) >> 14;

        let t_fine = var1.wrapping_add(var2);
        (
            t_fine.wrapping_mul(5).wrapping_add(128),
            Some(FineTemperature(t_fine)),
        )
    }

    /// Compensated pressure in Pa as Q24.8 (value / 256 = Pa).
    ///
    /// Returns 0 when the P1-scaled denominator is zero.
    pub fn compensate_pressure(&self, raw: u32, fine: FineTemperature) -> i32 {
        if raw == SKIPPED_TP_CODE {
            return DISABLED;
        }
        let adc_p = (raw >> 4) as i64;

        let mut var1 = fine.0 as i64 - 128_000;
        let mut var2 = var1.wrapping_mul(var1).wrapping_mul(self.dig_p6 as i64);
        var2 = var2.wrapping_add(var1.wrapping_mul(self.dig_p5 as i64) << 17);
        var2 = var2.wrapping_add((self.dig_p4 as i64) << 35);
        var1 = (var1.wrapping_mul(var1).wrapping_mul(self.dig_p3 as i64) >> 8)
            .wrapping_add(var1.wrapping_mul(self.dig_p2 as i64) << 12);
        var1 = ((1i64 << 47).wrapping_add(var1)).wrapping_mul(self.dig_p1 as i64) >> 33;

        if var1 == 0 {
            // avoid division by zero
            return 0;
        }

        let mut p = 1_048_576 - adc_p;
        p = ((p << 31).wrapping_sub(var2))
            .wrapping_mul(3125)
            .wrapping_div(var1);
        var1 = (self.dig_p9 as i64).wrapping_mul(p >> 13).wrapping_mul(p >> 13) >> 25;
        var2 = (self.dig_p8 as i64).wrapping_mul(p) >> 19;

        (((p.wrapping_add(var1).wrapping_add(var2)) >> 8) + ((self.dig_p7 as i64) << 4)) as i32
    }

    /// Compensated relative humidity in %RH as Q22.10 (value / 1024 = %RH),
    /// always within `0..=102400`.
    pub fn compensate_humidity(&self, raw: u32, fine: FineTemperature) -> i32 {
        if raw == SKIPPED_H_CODE {
            return DISABLED;
        }
        let adc_h = raw as i32;
        let h1 = self.dig_h1 as i32;
        let h2 = self.dig_h2 as i32;
        let h3 = self.dig_h3 as i32;
        let h4 = self.dig_h4 as i32;
        let h5 = self.dig_h5 as i32;
        let h6 = self.dig_h6 as i32;

        let mut v = fine.0.wrapping_sub(76_800);

        let scaled = ((adc_h << 14)
            .wrapping_sub(h4 << 20)
            .wrapping_sub(h5.wrapping_mul(v))
            .wrapping_add(16_384))
            >> 15;
        let h6_term = v.wrapping_mul(h6) >> 10;
        let h3_term = (v.wrapping_mul(h3) >> 11).wrapping_add(32_768);
        let sensitivity = (((h6_term.wrapping_mul(h3_term) >> 10).wrapping_add(2_097_152))
            .wrapping_mul(h2)
            .wrapping_add(8_192))
            >> 14;
        v = scaled.wrapping_mul(sensitivity);

        v = v.wrapping_sub((((v >> 15).wrapping_mul(v >> 15) >> 7).wrapping_mul(h1)) >> 4);
        v = v.clamp(0, HUMIDITY_INTERMEDIATE_MAX);
        v >> 12
    }

    /// Compensate one frame. Temperature runs first; its fine temperature
    /// feeds pressure and humidity.
    ///
    /// With temperature skipped there is no fine temperature for this
    /// reading, so all three channels come back disabled.
    pub fn compensate(&self, frame: &RawFrame) -> SensorSample {
        let (temperature, fine) = self.compensate_temperature(frame.temperature);
        match fine {
            Some(fine) => SensorSample {
                temperature,
                pressure: self.compensate_pressure(frame.pressure, fine),
                humidity: self.compensate_humidity(frame.humidity, fine),
            },
            None => SensorSample::disabled(),
        }
    }
}
