//! Byte-oriented register access
//!
//! The sensor driver only needs three primitives from the bus: write one
//! register, read one register, and read a run of consecutive registers in a
//! single transaction. Every call reports failure explicitly so a NACK or bus
//! fault is never mistaken for a register that really reads zero.

use embedded_hal::i2c::Error as _;
use embedded_hal_async::i2c::I2c;
use log::error;
use thiserror_no_std::Error;

/// Primary BME280 address (SDO tied to GND)
pub const BME280_PRIMARY_ADDRESS: u8 = 0x76;
/// Secondary BME280 address (SDO tied to VDDIO)
pub const BME280_SECONDARY_ADDRESS: u8 = 0x77;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("bus write to register {register:#04x} failed")]
    Write { register: u8 },
    #[error("bus read from register {register:#04x} failed")]
    Read { register: u8 },
    #[error("burst read of {len} bytes from register {register:#04x} failed")]
    Burst { register: u8, len: usize },
}

/// Register-level access to a device.
pub trait RegisterTransport {
    /// Write `value` into `register`.
    fn write_byte(
        &mut self,
        register: u8,
        value: u8,
    ) -> impl Future<Output = Result<(), TransportError>>;

    /// Read a single register.
    fn read_byte(&mut self, register: u8) -> impl Future<Output = Result<u8, TransportError>>;

    /// Fill `buffer` with the registers starting at `start`, in one transaction.
    fn read_burst(
        &mut self,
        start: u8,
        buffer: &mut [u8],
    ) -> impl Future<Output = Result<(), TransportError>>;
}

/// [`RegisterTransport`] over an async I2C bus.
pub struct I2cTransport<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> I2cTransport<I> {
    pub const fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    pub const fn address(&self) -> u8 {
        self.address
    }

    pub fn bus_mut(&mut self) -> &mut I {
        &mut self.i2c
    }

    /// Give the bus back, e.g. to probe the secondary address.
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> RegisterTransport for I2cTransport<I> {
    async fn write_byte(&mut self, register: u8, value: u8) -> Result<(), TransportError> {
        self.i2c
            .write(self.address, &[register, value])
            .await
            .map_err(|e| {
                error!("I2C write {:#04x} <- {:#04x} failed: {:?}", register, value, e.kind());
                TransportError::Write { register }
            })
    }

    async fn read_byte(&mut self, register: u8) -> Result<u8, TransportError> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .await
            .map_err(|e| {
                error!("I2C read {:#04x} failed: {:?}", register, e.kind());
                TransportError::Read { register }
            })?;
        Ok(value[0])
    }

    async fn read_burst(&mut self, start: u8, buffer: &mut [u8]) -> Result<(), TransportError> {
        let len = buffer.len();
        self.i2c
            .write_read(self.address, &[start], buffer)
            .await
            .map_err(|e| {
                error!("I2C burst read {:#04x} (+{}) failed: {:?}", start, len, e.kind());
                TransportError::Burst {
                    register: start,
                    len,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBme280;
    use embassy_futures::block_on;

    #[test]
    fn test_read_byte_returns_chip_id() {
        let mut transport = I2cTransport::new(MockBme280::new(), BME280_PRIMARY_ADDRESS);
        let id = block_on(transport.read_byte(0xD0)).unwrap();
        assert_eq!(id, 0x60);
    }

    #[test]
    fn test_wrong_address_is_a_transport_failure() {
        let mut transport = I2cTransport::new(MockBme280::new(), BME280_SECONDARY_ADDRESS);
        let err = block_on(transport.read_byte(0xD0)).unwrap_err();
        assert_eq!(err, TransportError::Read { register: 0xD0 });
    }

    #[test]
    fn test_secondary_address_device() {
        let bus = MockBme280::new().with_address(BME280_SECONDARY_ADDRESS);
        let mut transport = I2cTransport::new(bus, BME280_SECONDARY_ADDRESS);
        assert_eq!(transport.address(), 0x77);
        assert_eq!(block_on(transport.read_byte(0xD0)).unwrap(), 0x60);
    }

    #[test]
    fn test_bus_fault_on_burst_is_reported() {
        let mut bus = MockBme280::new();
        bus.set_bus_fault(true);
        let mut transport = I2cTransport::new(bus, BME280_PRIMARY_ADDRESS);
        let mut buffer = [0u8; 8];
        let err = block_on(transport.read_burst(0xF7, &mut buffer)).unwrap_err();
        assert_eq!(
            err,
            TransportError::Burst {
                register: 0xF7,
                len: 8
            }
        );
    }

    #[test]
    fn test_write_lands_in_register_file() {
        let mut transport = I2cTransport::new(MockBme280::new(), BME280_PRIMARY_ADDRESS);
        block_on(transport.write_byte(0xF5, 0xA0)).unwrap();
        assert_eq!(transport.release().register(0xF5), 0xA0);
    }
}
