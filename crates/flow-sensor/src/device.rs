//! SFM3019 Device
//!
//! Low-level driver: one method per sensor command.

use crate::error::BusError;
use crate::i2c::I2cDevice;
use crate::sensirion::SensirionDevice;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Factory default I2C address
pub const DEFAULT_ADDRESS: u8 = 0x2E;
/// I2C general call address, used for the soft reset
pub const GENERAL_CALL_ADDRESS: u8 = 0x00;
/// Product identifier reported by every SFM3019
pub const PRODUCT_NUMBER: u32 = 0x0402_0611;

mod command {
    pub const STOP_MEASURE: u16 = 0x3FF9;
    pub const READ_CONVERSION: u16 = 0x3661;
    pub const READ_PRODUCT_ID: u16 = 0xE102;
    /// Sent to the general call address
    pub const RESET: u8 = 0x06;
}

/// Gas calibration; the value is the start-measurement command for that gas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum GasType {
    O2 = 0x3603,
    #[default]
    Air = 0x3608,
    /// Air/O2 mixture
    Mixture = 0x3632,
}

impl GasType {
    pub fn command(self) -> u16 {
        self as u16
    }
}

/// SI prefix of a flow unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum UnitPrefix {
    Nano = 3,
    Micro = 4,
    Milli = 5,
    Centi = 6,
    Deci = 7,
    None = 8,
    Deca = 9,
    Hecto = 10,
    Kilo = 11,
    Mega = 12,
    Giga = 13,
}

/// Time base of a flow unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum TimeBase {
    None = 0,
    PerMicrosecond = 1,
    PerMillisecond = 2,
    PerSecond = 3,
    PerMinute = 4,
    PerHour = 5,
    PerDay = 6,
}

/// Volume or mass unit of a flow unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Unit {
    NormLiter = 0,
    /// Standard liter at 20 °C
    StandardLiter20C = 1,
    StandardLiter15C = 2,
    StandardLiter25C = 3,
    Liter = 8,
    Gram = 9,
}

/// Flow unit as encoded in the conversion factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowUnit {
    pub prefix: UnitPrefix,
    pub time_base: TimeBase,
    pub unit: Unit,
}

impl FlowUnit {
    /// Standard liters (20 °C) per minute, the SFM3019 calibration unit
    pub const SLM: FlowUnit = FlowUnit {
        prefix: UnitPrefix::None,
        time_base: TimeBase::PerMinute,
        unit: Unit::StandardLiter20C,
    };

    pub const fn encode(self) -> u16 {
        (self.prefix as u16) | ((self.time_base as u16) << 4) | ((self.unit as u16) << 8)
    }
}

/// Conversion from raw readings to physical flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFactors {
    pub scale_factor: i16,
    pub offset: i16,
    pub flow_unit: u16,
}

impl ConversionFactors {
    /// Datasheet values for the SFM3019
    pub const SFM3019: ConversionFactors = ConversionFactors {
        scale_factor: 170,
        offset: -24_576,
        flow_unit: FlowUnit::SLM.encode(),
    };

    pub fn flow(&self, raw_flow: i16) -> f32 {
        (f32::from(raw_flow) - f32::from(self.offset)) / f32::from(self.scale_factor)
    }
}

/// A flow measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub raw_flow: i16,
    /// Flow (L/min)
    pub flow: f32,
}

/// SFM3019 on an I2C bus
///
/// `global` must address the general call address of the same bus; only the soft reset
/// uses it.
#[derive(Debug)]
pub struct Device<D> {
    sensirion: SensirionDevice<D>,
    global: D,
    gas: GasType,
}

impl<D: I2cDevice> Device<D> {
    pub fn new(dev: D, global: D, gas: GasType) -> Self {
        Self {
            sensirion: SensirionDevice::new(dev),
            global,
            gas,
        }
    }

    /// Start continuous measurement for the configured gas
    pub fn start_measure(&mut self) -> Result<(), BusError> {
        debug!(gas = ?self.gas, "SFM3019 start measurement");
        self.sensirion.write_command(self.gas.command())
    }

    pub fn stop_measure(&mut self) -> Result<(), BusError> {
        self.sensirion.write_command(command::STOP_MEASURE)
    }

    pub fn read_product_id(&mut self) -> Result<u32, BusError> {
        self.sensirion.write_command(command::READ_PRODUCT_ID)?;
        let [hi, lo] = self.sensirion.read_words::<2>()?;
        Ok((u32::from(hi) << 16) | u32::from(lo))
    }

    /// Ask for the conversion factors of the configured gas
    pub fn request_conversion_factors(&mut self) -> Result<(), BusError> {
        self.sensirion
            .write_command_with_arg(command::READ_CONVERSION, self.gas.command())
    }

    pub fn read_conversion_factors(&mut self) -> Result<ConversionFactors, BusError> {
        let [scale_factor, offset, flow_unit] = self.sensirion.read_words::<3>()?;
        Ok(ConversionFactors {
            scale_factor: scale_factor as i16,
            offset: offset as i16,
            flow_unit,
        })
    }

    /// Read one flow measurement
    pub fn read_sample(&mut self, conversion: &ConversionFactors) -> Result<Sample, BusError> {
        if conversion.scale_factor == 0 {
            return Err(BusError::InvalidArguments);
        }
        let [raw] = self.sensirion.read_words::<1>()?;
        let raw_flow = raw as i16;
        Ok(Sample {
            raw_flow,
            flow: conversion.flow(raw_flow),
        })
    }

    /// Soft reset of every device on the bus that honours the general call
    pub fn reset(&mut self) -> Result<(), BusError> {
        self.global.write(&[command::RESET])
    }

    pub fn gas(&self) -> GasType {
        self.gas
    }

    pub fn bus_mut(&mut self) -> &mut D {
        self.sensirion.inner_mut()
    }

    pub fn global_mut(&mut self) -> &mut D {
        &mut self.global
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::HalI2cDevice;
    use data_validator::{Checksum, Crc8};
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    type HalDevice = Device<HalI2cDevice<I2cMock>>;

    /// Device on mocked buses, plus handles to check the buses were fully used
    fn device(bus: &[I2cTransaction], global: &[I2cTransaction]) -> (HalDevice, I2cMock, I2cMock) {
        let bus = I2cMock::new(bus);
        let global = I2cMock::new(global);
        let device = Device::new(
            HalI2cDevice::new(bus.clone(), DEFAULT_ADDRESS),
            HalI2cDevice::new(global.clone(), GENERAL_CALL_ADDRESS),
            GasType::Air,
        );
        (device, bus, global)
    }

    /// Words as the sensor sends them, each followed by its CRC
    fn with_crc(words: &[u16]) -> Vec<u8> {
        words
            .iter()
            .flat_map(|word| {
                let [hi, lo] = word.to_be_bytes();
                [hi, lo, Crc8.compute(&[hi, lo])]
            })
            .collect()
    }

    #[test]
    fn test_flow_unit_encoding() {
        assert_eq!(FlowUnit::SLM.encode(), 0x0148);
        let unit = FlowUnit {
            prefix: UnitPrefix::Milli,
            time_base: TimeBase::PerSecond,
            unit: Unit::Liter,
        };
        assert_eq!(unit.encode(), 0x0835);
    }

    #[test]
    fn test_conversion() {
        let conversion = ConversionFactors::SFM3019;
        assert_eq!(conversion.flow(-24_576), 0.0);
        assert!((conversion.flow(-24_576 + 1700) - 10.0).abs() < 1e-4);
        assert!((conversion.flow(-24_576 - 340) + 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_commands() {
        let crc = Crc8.compute(&[0x36, 0x08]);
        let (mut device, mut bus, mut global) = device(
            &[
                I2cTransaction::write(DEFAULT_ADDRESS, vec![0x36, 0x08]),
                I2cTransaction::write(DEFAULT_ADDRESS, vec![0x3F, 0xF9]),
                I2cTransaction::write(DEFAULT_ADDRESS, vec![0x36, 0x61, 0x36, 0x08, crc]),
            ],
            &[I2cTransaction::write(GENERAL_CALL_ADDRESS, vec![0x06])],
        );

        device.start_measure().unwrap();
        device.stop_measure().unwrap();
        device.request_conversion_factors().unwrap();
        device.reset().unwrap();

        bus.done();
        global.done();
    }

    #[test]
    fn test_read_product_id() {
        let (mut device, mut bus, mut global) = device(
            &[
                I2cTransaction::write(DEFAULT_ADDRESS, vec![0xE1, 0x02]),
                I2cTransaction::read(DEFAULT_ADDRESS, with_crc(&[0x0402, 0x0611])),
            ],
            &[],
        );
        assert_eq!(device.read_product_id(), Ok(PRODUCT_NUMBER));
        bus.done();
        global.done();
    }

    #[test]
    fn test_read_conversion_and_sample() {
        let (mut device, mut bus, mut global) = device(
            &[
                I2cTransaction::read(
                    DEFAULT_ADDRESS,
                    with_crc(&[170, (-24_576i16) as u16, FlowUnit::SLM.encode()]),
                ),
                I2cTransaction::read(DEFAULT_ADDRESS, with_crc(&[(-24_576i16 + 850) as u16])),
            ],
            &[],
        );
        let conversion = device.read_conversion_factors().unwrap();
        assert_eq!(conversion, ConversionFactors::SFM3019);

        let sample = device.read_sample(&conversion).unwrap();
        assert_eq!(sample.raw_flow, -23_726);
        assert!((sample.flow - 5.0).abs() < 1e-4);
        bus.done();
        global.done();
    }

    #[test]
    fn test_sample_nack_and_corruption() {
        let nack = embedded_hal::i2c::ErrorKind::NoAcknowledge(
            embedded_hal::i2c::NoAcknowledgeSource::Data,
        );
        let mut corrupted = with_crc(&[0x1234]);
        corrupted[2] ^= 0xFF;
        let (mut device, mut bus, mut global) = device(
            &[
                I2cTransaction::read(DEFAULT_ADDRESS, vec![0; 3]).with_error(nack),
                I2cTransaction::read(DEFAULT_ADDRESS, corrupted.clone()),
            ],
            &[],
        );
        let conversion = ConversionFactors::SFM3019;
        assert_eq!(device.read_sample(&conversion), Err(BusError::NoNewData));
        assert_eq!(
            device.read_sample(&conversion),
            Err(BusError::CrcMismatch {
                expected: corrupted[2] ^ 0xFF,
                actual: corrupted[2],
            })
        );
        bus.done();
        global.done();
    }

    #[test]
    fn test_zero_scale_factor_rejected() {
        // Rejected before touching the bus
        let (mut device, mut bus, mut global) = device(&[], &[]);
        let conversion = ConversionFactors {
            scale_factor: 0,
            ..ConversionFactors::SFM3019
        };
        assert_eq!(
            device.read_sample(&conversion),
            Err(BusError::InvalidArguments)
        );
        bus.done();
        global.done();
    }
}
