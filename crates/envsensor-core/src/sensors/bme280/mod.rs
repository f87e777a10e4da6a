//! BME280 device session
//!
//! The session owns the register transport and a delay source, and holds the
//! calibration record read during [`Bme280::init`]. Every wait on the device is
//! a bounded poll: a readiness bit that never clears becomes a timeout error,
//! never a hang.

pub mod calibration;
pub mod compensation;
pub mod frame;
pub mod registers;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use thiserror_no_std::Error;

use crate::sample::SensorSample;
use crate::sensors::Sensor;
use crate::transport::{RegisterTransport, TransportError};

pub use calibration::CalibrationRecord;
pub use compensation::FineTemperature;
pub use frame::{FRAME_LEN, RawFrame};
pub use registers::{Filter, Mode, Oversampling, SamplingConfig, StandbyDuration};

use registers::{
    BME280_CHIP_ID, CALIB_H_LEN, CALIB_TP_LEN, CtrlMeas, REG_CALIB_H2, REG_CALIB_T1, REG_CHIP_ID,
    REG_CONFIG, REG_CTRL_HUM, REG_CTRL_MEAS, REG_PRESS_MSB, REG_SOFT_RESET, REG_STATUS,
    SOFT_RESET_COMMAND, Status,
};

/// Wait after the soft reset before the first im_update poll.
pub const RESET_SETTLE_MS: u32 = 10;
pub const CALIBRATION_POLL_INTERVAL_MS: u32 = 10;
pub const CALIBRATION_MAX_POLLS: u32 = 20;
/// Wait after programming the sampling registers before the first reading.
pub const SAMPLING_SETTLE_MS: u32 = 100;
/// x16 oversampling on all three channels converts in about 113 ms.
pub const MEASUREMENT_POLL_INTERVAL_MS: u32 = 5;
pub const MEASUREMENT_MAX_POLLS: u32 = 50;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bme280Error {
    #[error("no BME280 found (chip id {chip_id:#04x})")]
    SensorNotFound { chip_id: u8 },
    #[error("calibration data still loading after {attempts} polls")]
    CalibrationTimeout { attempts: u32 },
    #[error("forced measurement still running after {attempts} polls")]
    MeasurementTimeout { attempts: u32 },
    #[error("sensor read before init completed")]
    NotInitialized,
    #[error("transport failure: {0}")]
    Transport(TransportError),
}

impl From<TransportError> for Bme280Error {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

/// What a chip id most likely belongs to.
pub const fn likely_device(chip_id: u8) -> &'static str {
    match chip_id {
        0xFF => "bad address, BMP180 or BMP085",
        0x56..=0x58 => "BMP280",
        0x60 => "BME280",
        0x61 => "BME680",
        _ => "unknown device",
    }
}

pub struct Bme280<T, D> {
    transport: T,
    delay: D,
    chip_id: Option<u8>,
    calibration: Option<CalibrationRecord>,
    sampling: SamplingConfig,
}

impl<T: RegisterTransport, D: DelayNs> Bme280<T, D> {
    pub const fn new(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            chip_id: None,
            calibration: None,
            sampling: SamplingConfig {
                mode: Mode::Sleep,
                temperature: Oversampling::Skipped,
                pressure: Oversampling::Skipped,
                humidity: Oversampling::Skipped,
                filter: Filter::Off,
                standby: StandbyDuration::Ms0_5,
            },
        }
    }

    /// Bring the device up: identity check, soft reset, wait for the NVM copy,
    /// read calibration, program `sampling`.
    ///
    /// Any failure leaves the session without calibration, so a later
    /// [`read_sample`](Self::read_sample) reports `NotInitialized` until `init`
    /// succeeds again.
    pub async fn init(&mut self, sampling: SamplingConfig) -> Result<(), Bme280Error> {
        self.calibration = None;

        let chip_id = self.identify().await?;
        self.chip_id = Some(chip_id);
        if chip_id != BME280_CHIP_ID {
            error!(
                "BME280 not found: chip id {:#04x} looks like {}",
                chip_id,
                likely_device(chip_id)
            );
            return Err(Bme280Error::SensorNotFound { chip_id });
        }

        self.begin_calibration_load().await?;

        let mut attempts = 0;
        while self.is_calibration_busy().await? {
            attempts += 1;
            if attempts >= CALIBRATION_MAX_POLLS {
                error!("BME280 calibration copy did not finish after {} polls", attempts);
                return Err(Bme280Error::CalibrationTimeout { attempts });
            }
            debug!("BME280 calibration busy, poll {}", attempts);
            self.delay.delay_ms(CALIBRATION_POLL_INTERVAL_MS).await;
        }

        let calibration = self.read_calibration().await?;
        self.set_sampling(sampling).await?;
        self.delay.delay_ms(SAMPLING_SETTLE_MS).await;

        self.calibration = Some(calibration);
        info!("BME280 ready (mode {:?})", sampling.mode);
        Ok(())
    }

    /// Read the chip-identity register.
    pub async fn identify(&mut self) -> Result<u8, Bme280Error> {
        Ok(self.transport.read_byte(REG_CHIP_ID).await?)
    }

    /// Soft reset; the device then copies its NVM trim into the image registers.
    pub async fn begin_calibration_load(&mut self) -> Result<(), Bme280Error> {
        self.transport
            .write_byte(REG_SOFT_RESET, SOFT_RESET_COMMAND)
            .await?;
        self.delay.delay_ms(RESET_SETTLE_MS).await;
        Ok(())
    }

    pub async fn is_calibration_busy(&mut self) -> Result<bool, Bme280Error> {
        let status = self.transport.read_byte(REG_STATUS).await?;
        Ok(Status::decode(status).im_update)
    }

    /// Read both calibration blocks, each in one burst.
    pub async fn read_calibration(&mut self) -> Result<CalibrationRecord, Bme280Error> {
        let mut tp = [0u8; CALIB_TP_LEN];
        let mut h = [0u8; CALIB_H_LEN];
        self.transport.read_burst(REG_CALIB_T1, &mut tp).await?;
        self.transport.read_burst(REG_CALIB_H2, &mut h).await?;
        Ok(CalibrationRecord::from_registers(&tp, &h))
    }

    /// Program the three control registers.
    ///
    /// The device is put to sleep first, since config writes in normal mode
    /// may be ignored. ctrl_hum goes before ctrl_meas because it only latches
    /// on the next ctrl_meas write.
    pub async fn set_sampling(&mut self, sampling: SamplingConfig) -> Result<(), Bme280Error> {
        self.transport
            .write_byte(REG_CTRL_MEAS, CtrlMeas::SLEEP.encode())
            .await?;
        self.transport
            .write_byte(REG_CTRL_HUM, sampling.ctrl_hum().encode())
            .await?;
        self.transport
            .write_byte(REG_CONFIG, sampling.config().encode())
            .await?;
        self.transport
            .write_byte(REG_CTRL_MEAS, sampling.ctrl_meas().encode())
            .await?;
        self.sampling = sampling;
        Ok(())
    }

    /// Burst-read the output block. In forced mode a conversion is triggered
    /// first and waited for.
    pub async fn read_frame(&mut self) -> Result<RawFrame, Bme280Error> {
        if self.sampling.mode == Mode::Forced {
            self.trigger_forced_measurement().await?;
        }
        let mut bytes = [0u8; FRAME_LEN];
        self.transport.read_burst(REG_PRESS_MSB, &mut bytes).await?;
        Ok(RawFrame::decode(&bytes))
    }

    async fn trigger_forced_measurement(&mut self) -> Result<(), Bme280Error> {
        self.transport
            .write_byte(REG_CTRL_MEAS, self.sampling.ctrl_meas().encode())
            .await?;

        let mut attempts = 0;
        loop {
            let status = self.transport.read_byte(REG_STATUS).await?;
            if !Status::decode(status).measuring {
                return Ok(());
            }
            attempts += 1;
            if attempts >= MEASUREMENT_MAX_POLLS {
                warn!("BME280 forced measurement did not finish after {} polls", attempts);
                return Err(Bme280Error::MeasurementTimeout { attempts });
            }
            self.delay.delay_ms(MEASUREMENT_POLL_INTERVAL_MS).await;
        }
    }

    /// One complete reading. A transport failure returns before anything is
    /// compensated.
    pub async fn read_sample(&mut self) -> Result<SensorSample, Bme280Error> {
        let calibration = self.calibration.ok_or(Bme280Error::NotInitialized)?;
        let frame = self.read_frame().await?;
        let sample = calibration.compensate(&frame);
        debug!("BME280 sample: {}", sample);
        Ok(sample)
    }

    /// Chip id read by the last `init`.
    pub const fn chip_id(&self) -> Option<u8> {
        self.chip_id
    }

    pub const fn calibration(&self) -> Option<&CalibrationRecord> {
        self.calibration.as_ref()
    }

    pub const fn sampling(&self) -> &SamplingConfig {
        &self.sampling
    }

    pub const fn is_initialized(&self) -> bool {
        self.calibration.is_some()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }
}

impl<T: RegisterTransport, D: DelayNs> Sensor<3> for Bme280<T, D> {
    type Readings = SensorSample;
    type Error = Bme280Error;

    async fn read(&mut self) -> Result<SensorSample, Bme280Error> {
        self.read_sample().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{DATASHEET_CALIBRATION, MockBme280, NoopDelay};
    use crate::transport::{BME280_PRIMARY_ADDRESS, I2cTransport};
    use embassy_futures::block_on;

    type TestSensor = Bme280<I2cTransport<MockBme280>, NoopDelay>;

    fn sensor(bus: MockBme280) -> TestSensor {
        Bme280::new(I2cTransport::new(bus, BME280_PRIMARY_ADDRESS), NoopDelay::new())
    }

    fn bus(sensor: TestSensor) -> MockBme280 {
        sensor.release().0.release()
    }

    #[test]
    fn test_init_write_order() {
        let mut bme = sensor(MockBme280::new());
        block_on(bme.init(SamplingConfig::default())).unwrap();
        assert_eq!(bme.chip_id(), Some(0x60));
        assert_eq!(bme.calibration(), Some(&DATASHEET_CALIBRATION));

        let bus = bus(bme);
        assert_eq!(
            bus.writes(),
            &[
                (REG_SOFT_RESET, SOFT_RESET_COMMAND),
                (REG_CTRL_MEAS, 0x00),
                (REG_CTRL_HUM, 0x05),
                (REG_CONFIG, 0x00),
                (REG_CTRL_MEAS, 0xB7),
            ]
        );
    }

    #[test]
    fn test_identity_mismatch_fails_before_reset() {
        let mut bme = sensor(MockBme280::new().with_chip_id(0x58));
        let err = block_on(bme.init(SamplingConfig::default())).unwrap_err();
        assert_eq!(err, Bme280Error::SensorNotFound { chip_id: 0x58 });
        assert_eq!(bme.chip_id(), Some(0x58));
        assert!(!bme.is_initialized());
        assert!(bus(bme).writes().is_empty());
    }

    #[test]
    fn test_calibration_busy_is_polled() {
        let mut bme = sensor(MockBme280::new().with_calibration_busy_polls(3));
        block_on(bme.init(SamplingConfig::default())).unwrap();
        let (transport, delay) = bme.release();
        // reset settle, three busy polls, sampling settle
        assert_eq!(
            delay.elapsed_ms(),
            RESET_SETTLE_MS + 3 * CALIBRATION_POLL_INTERVAL_MS + SAMPLING_SETTLE_MS
        );
        assert_eq!(transport.release().status_reads(), 4);
    }

    #[test]
    fn test_calibration_busy_forever_times_out() {
        let mut bme = sensor(MockBme280::new().with_calibration_busy_polls(u32::MAX));
        let err = block_on(bme.init(SamplingConfig::default())).unwrap_err();
        assert_eq!(
            err,
            Bme280Error::CalibrationTimeout {
                attempts: CALIBRATION_MAX_POLLS
            }
        );
        assert!(!bme.is_initialized());
        assert_eq!(bus(bme).status_reads(), CALIBRATION_MAX_POLLS);
    }

    #[test]
    fn test_transport_failure_during_init_is_reported() {
        let mut mock = MockBme280::new();
        mock.set_bus_fault(true);
        let mut bme = sensor(mock);
        let err = block_on(bme.init(SamplingConfig::default())).unwrap_err();
        assert_eq!(
            err,
            Bme280Error::Transport(TransportError::Read {
                register: REG_CHIP_ID
            })
        );
    }

    #[test]
    fn test_read_before_init() {
        let mut bme = sensor(MockBme280::new());
        assert_eq!(
            block_on(bme.read_sample()).unwrap_err(),
            Bme280Error::NotInitialized
        );
    }

    #[test]
    fn test_read_sample_normal_mode() {
        let mut bme = sensor(MockBme280::new());
        block_on(bme.init(SamplingConfig::default())).unwrap();
        let sample = block_on(bme.read()).unwrap();
        assert_eq!(sample.temperature, 642_238);
        assert_eq!(sample.pressure, 25_767_233);
        assert_eq!(sample.humidity, 56_317);
    }

    #[test]
    fn test_read_sample_transport_failure() {
        let mut bme = sensor(MockBme280::new());
        block_on(bme.init(SamplingConfig::default())).unwrap();
        bme.transport_mut().bus_mut().set_bus_fault(true);
        assert_eq!(
            block_on(bme.read_sample()).unwrap_err(),
            Bme280Error::Transport(TransportError::Burst {
                register: REG_PRESS_MSB,
                len: FRAME_LEN
            })
        );
        // the session stays usable once the bus recovers
        bme.transport_mut().bus_mut().set_bus_fault(false);
        assert!(block_on(bme.read_sample()).is_ok());
    }

    #[test]
    fn test_forced_mode_triggers_and_waits() {
        let forced = SamplingConfig {
            mode: Mode::Forced,
            ..SamplingConfig::default()
        };
        let mut bme = sensor(MockBme280::new().with_measuring_polls(2));
        block_on(bme.init(forced)).unwrap();
        let sample = block_on(bme.read_sample()).unwrap();
        assert_eq!(sample.temperature, 642_238);
        assert_eq!(bme.sampling().mode, Mode::Forced);

        let bus = bus(bme);
        let last = *bus.writes().last().unwrap();
        assert_eq!(last, (REG_CTRL_MEAS, forced.ctrl_meas().encode()));
    }

    #[test]
    fn test_forced_mode_measurement_timeout() {
        let forced = SamplingConfig {
            mode: Mode::Forced,
            ..SamplingConfig::default()
        };
        let mut bme = sensor(MockBme280::new().with_measuring_polls(u32::MAX));
        block_on(bme.init(forced)).unwrap();
        assert_eq!(
            block_on(bme.read_sample()).unwrap_err(),
            Bme280Error::MeasurementTimeout {
                attempts: MEASUREMENT_MAX_POLLS
            }
        );
    }

    #[test]
    fn test_skipped_humidity_reads_disabled() {
        let sampling = SamplingConfig {
            humidity: Oversampling::Skipped,
            ..SamplingConfig::default()
        };
        let mut bme = sensor(MockBme280::new());
        block_on(bme.init(sampling)).unwrap();
        let sample = block_on(bme.read_sample()).unwrap();
        assert_eq!(sample.humidity, crate::sample::DISABLED);
        assert_eq!(sample.temperature, 642_238);
    }

    #[test]
    fn test_likely_device() {
        assert_eq!(likely_device(0x57), "BMP280");
        assert_eq!(likely_device(0x61), "BME680");
        assert_eq!(likely_device(0xFF), "bad address, BMP180 or BMP085");
    }
}
