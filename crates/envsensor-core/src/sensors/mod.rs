pub mod bme280;

/// Trait for sensors that produce typed readings.
pub trait Sensor<const COUNT: usize> {
    /// The type of readings this sensor produces.
    type Readings;
    type Error;

    /// Take one reading.
    fn read(&mut self) -> impl Future<Output = Result<Self::Readings, Self::Error>>;
}

pub use bme280::{Bme280, Bme280Error};
