//! Mock peripherals for tests and host simulation
//!
//! Available during test builds and with the `mock` feature. Each mock keeps
//! enough device state to check protocol order and to inject the failures the
//! node has to survive: bus faults, a calibration copy that never finishes,
//! corrupted retained memory and an access point that stops answering.

mod bme280;
mod delay;
mod memory;
mod station;

pub use bme280::{DATASHEET_FRAME, MockBme280};
pub use delay::NoopDelay;
pub use memory::{MockMemoryFault, MockRetainedMemory};
pub use station::{MockJoin, MockStation, MockStationFault};

use crate::sensors::bme280::CalibrationRecord;

/// Worked-example trim values from the BME280 datasheet, with a plausible
/// humidity set.
pub const DATASHEET_CALIBRATION: CalibrationRecord = CalibrationRecord {
    dig_t1: 27504,
    dig_t2: 26435,
    dig_t3: -1000,
    dig_p1: 36477,
    dig_p2: -10685,
    dig_p3: 3024,
    dig_p4: 2855,
    dig_p5: 140,
    dig_p6: -7,
    dig_p7: 15500,
    dig_p8: -14600,
    dig_p9: 6000,
    dig_h1: 75,
    dig_h2: 362,
    dig_h3: 0,
    dig_h4: 313,
    dig_h5: 50,
    dig_h6: 30,
};
