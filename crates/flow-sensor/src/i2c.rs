//! I2C Bus Abstraction

use crate::error::BusError;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use tracing::debug;

/// A single addressed device on an I2C bus
pub trait I2cDevice {
    /// Read exactly `buf.len()` bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError>;

    /// Write all of `buf`
    fn write(&mut self, buf: &[u8]) -> Result<(), BusError>;
}

impl<T: I2cDevice + ?Sized> I2cDevice for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), BusError> {
        (**self).write(buf)
    }
}

/// [`I2cDevice`] on top of an `embedded-hal` 1.0 bus
#[derive(Debug)]
pub struct HalI2cDevice<I> {
    bus: I,
    address: u8,
}

impl<I: I2c> HalI2cDevice<I> {
    pub fn new(bus: I, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I {
        self.bus
    }
}

impl<I: I2c> I2cDevice for HalI2cDevice<I> {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        self.bus.read(self.address, buf).map_err(|err| {
            let kind = err.kind();
            debug!(address = self.address, ?kind, "I2C read failed");
            match kind {
                // Sensirion devices NACK reads while no new data is ready
                ErrorKind::NoAcknowledge(_) => BusError::NoNewData,
                _ => BusError::ReadError,
            }
        })
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), BusError> {
        self.bus.write(self.address, buf).map_err(|err| {
            debug!(address = self.address, kind = ?err.kind(), "I2C write failed");
            BusError::WriteError
        })
    }
}
