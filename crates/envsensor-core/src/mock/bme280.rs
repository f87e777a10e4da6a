//! Simulated BME280 register file on an I2C bus

use embedded_hal_async::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use std::vec::Vec;

use super::DATASHEET_CALIBRATION;
use crate::sensors::bme280::calibration::CalibrationRecord;
use crate::sensors::bme280::compensation::{SKIPPED_H_CODE, SKIPPED_TP_CODE};
use crate::sensors::bme280::frame::RawFrame;
use crate::sensors::bme280::registers::{
    BME280_CHIP_ID, CALIB_TP_LEN, CtrlHum, CtrlMeas, Mode, Oversampling, REG_CALIB_H2,
    REG_CALIB_T1, REG_CHIP_ID, REG_CONFIG, REG_CTRL_HUM, REG_CTRL_MEAS, REG_PRESS_MSB, REG_SOFT_RESET,
    REG_STATUS, SOFT_RESET_COMMAND, STATUS_IM_UPDATE_BIT, STATUS_MEASURING_BIT,
};
use crate::transport::BME280_PRIMARY_ADDRESS;

/// Conversion output of the datasheet example: adc_T 519888, adc_P 415148.
pub const DATASHEET_FRAME: RawFrame = RawFrame {
    pressure: 415_148 << 4,
    temperature: 519_888 << 4,
    humidity: 30_000,
};

/// Register-level BME280 model.
///
/// Writes follow the device's `register, value` pair protocol, reads
/// auto-increment from the last written register. Soft reset clears the
/// control registers and holds `im_update` for a configurable number of
/// status reads; a forced-mode `ctrl_meas` write holds `measuring` the same way.
/// Channels whose oversampling is skipped read back their disabled code.
#[derive(Debug, Clone)]
pub struct MockBme280 {
    address: u8,
    registers: [u8; 256],
    frame: RawFrame,
    pointer: u8,
    bus_fault: bool,
    calibration_busy_polls: u32,
    measuring_polls: u32,
    busy_remaining: u32,
    measuring_remaining: u32,
    status_reads: u32,
    resets: u32,
    writes: Vec<(u8, u8)>,
}

impl Default for MockBme280 {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBme280 {
    /// A healthy BME280 at 0x76 with the datasheet calibration and frame.
    pub fn new() -> Self {
        let mut mock = Self {
            address: BME280_PRIMARY_ADDRESS,
            registers: [0; 256],
            frame: DATASHEET_FRAME,
            pointer: 0,
            bus_fault: false,
            calibration_busy_polls: 0,
            measuring_polls: 0,
            busy_remaining: 0,
            measuring_remaining: 0,
            status_reads: 0,
            resets: 0,
            writes: Vec::new(),
        };
        mock.registers[REG_CHIP_ID as usize] = BME280_CHIP_ID;
        mock.load_calibration(&DATASHEET_CALIBRATION);
        mock
    }

    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    pub fn with_chip_id(mut self, chip_id: u8) -> Self {
        self.registers[REG_CHIP_ID as usize] = chip_id;
        self
    }

    /// Status reads that report `im_update` after each soft reset.
    pub fn with_calibration_busy_polls(mut self, polls: u32) -> Self {
        self.calibration_busy_polls = polls;
        self
    }

    /// Status reads that report `measuring` after each forced trigger.
    pub fn with_measuring_polls(mut self, polls: u32) -> Self {
        self.measuring_polls = polls;
        self
    }

    pub fn with_frame(mut self, frame: RawFrame) -> Self {
        self.frame = frame;
        self
    }

    /// Fail every transaction while set.
    pub fn set_bus_fault(&mut self, fault: bool) {
        self.bus_fault = fault;
    }

    /// Current content of a register, without side effects.
    pub fn register(&self, register: u8) -> u8 {
        self.registers[register as usize]
    }

    /// Every register write, in order.
    pub fn writes(&self) -> &[(u8, u8)] {
        &self.writes
    }

    pub fn status_reads(&self) -> u32 {
        self.status_reads
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    fn load_calibration(&mut self, calibration: &CalibrationRecord) {
        let (tp, h) = calibration.to_registers();
        let tp_start = REG_CALIB_T1 as usize;
        let h_start = REG_CALIB_H2 as usize;
        self.registers[tp_start..tp_start + CALIB_TP_LEN].copy_from_slice(&tp);
        self.registers[h_start..h_start + h.len()].copy_from_slice(&h);
    }

    fn write_register(&mut self, register: u8, value: u8) {
        self.writes.push((register, value));
        match register {
            REG_SOFT_RESET if value == SOFT_RESET_COMMAND => {
                self.resets += 1;
                self.registers[REG_CTRL_HUM as usize] = 0;
                self.registers[REG_CTRL_MEAS as usize] = 0;
                self.registers[REG_CONFIG as usize] = 0;
                self.busy_remaining = self.calibration_busy_polls;
            }
            REG_SOFT_RESET => {}
            REG_CTRL_MEAS => {
                self.registers[register as usize] = value;
                if CtrlMeas::decode(value).mode == Mode::Forced {
                    self.measuring_remaining = self.measuring_polls;
                }
            }
            _ => self.registers[register as usize] = value,
        }
    }

    fn read_register(&mut self, register: u8) -> u8 {
        match register {
            REG_STATUS => {
                self.status_reads += 1;
                let mut status = 0;
                if self.busy_remaining > 0 {
                    self.busy_remaining -= 1;
                    status |= 1 << STATUS_IM_UPDATE_BIT;
                }
                if self.measuring_remaining > 0 {
                    self.measuring_remaining -= 1;
                    status |= 1 << STATUS_MEASURING_BIT;
                }
                status
            }
            REG_PRESS_MSB..=0xFE => self.output_block()[(register - REG_PRESS_MSB) as usize],
            _ => self.registers[register as usize],
        }
    }

    fn output_block(&self) -> [u8; 8] {
        let ctrl_meas = CtrlMeas::decode(self.registers[REG_CTRL_MEAS as usize]);
        let ctrl_hum = CtrlHum::decode(self.registers[REG_CTRL_HUM as usize]);
        let pick = |osrs: Oversampling, code: u32, skipped: u32| {
            if osrs == Oversampling::Skipped {
                skipped
            } else {
                code
            }
        };
        let p = pick(ctrl_meas.osrs_p, self.frame.pressure, SKIPPED_TP_CODE);
        let t = pick(ctrl_meas.osrs_t, self.frame.temperature, SKIPPED_TP_CODE);
        let h = pick(ctrl_hum.osrs_h, self.frame.humidity, SKIPPED_H_CODE);
        [
            (p >> 16) as u8,
            (p >> 8) as u8,
            p as u8,
            (t >> 16) as u8,
            (t >> 8) as u8,
            t as u8,
            (h >> 8) as u8,
            h as u8,
        ]
    }
}

impl ErrorType for MockBme280 {
    type Error = ErrorKind;
}

impl I2c for MockBme280 {
    async fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.bus_fault {
            return Err(ErrorKind::Bus);
        }
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for operation in operations {
            match operation {
                Operation::Write(bytes) => {
                    for pair in bytes.chunks(2) {
                        self.pointer = pair[0];
                        if let Some(&value) = pair.get(1) {
                            self.write_register(pair[0], value);
                        }
                    }
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = self.read_register(self.pointer);
                        self.pointer = self.pointer.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}
