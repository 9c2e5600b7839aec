//! SFM3019 Flow Sensor Driver
//!
//! Drives a Sensirion SFM3019 mass flow meter over I2C. The [`Sensor`] is a polling Moore
//! machine: each call to [`Sensor::update`] performs at most one bus transaction and
//! reports whether a new validated flow sample is available, so the control loop never
//! blocks on the sensor.
//!
//! Layers, bottom-up:
//! - [`I2cDevice`]: one addressed device on a bus ([`HalI2cDevice`] adapts `embedded-hal`)
//! - [`SensirionDevice`]: 16-bit commands and CRC-protected word reads
//! - [`Device`]: SFM3019 commands
//! - [`StateMachine`] / [`Sensor`]: sequencing, timing and retry budgets

mod device;
mod error;
mod i2c;
pub mod mock;
mod sensirion;
mod sensor;
mod state_machine;

pub use device::{
    ConversionFactors, Device, FlowUnit, GasType, Sample, TimeBase, Unit, UnitPrefix,
    DEFAULT_ADDRESS, GENERAL_CALL_ADDRESS, PRODUCT_NUMBER,
};
pub use error::{BusError, SensorError, StepError};
pub use i2c::{HalI2cDevice, I2cDevice};
pub use sensirion::SensirionDevice;
pub use sensor::{FlowSensorConfig, Sensor};
pub use state_machine::{Action, StateMachine};
