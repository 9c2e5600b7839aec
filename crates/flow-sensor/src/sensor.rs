//! SFM3019 Sensor
//!
//! High-level driver. Every [`Sensor::update`] runs one step of the [`StateMachine`]:
//!
//! - `Initialize`: optional general call reset, then start measurement. The result is
//!   logged only; a dead sensor is caught by the range check.
//! - `WaitWarmup`: let the first measurements settle.
//! - `CheckRange`: identify the device and load its conversion factors. The device only
//!   answers these while idle, so measurement is stopped around them and the warm-up is
//!   waited out again afterwards. Then one sample within the flow range is required.
//!   Failures here share the setup retry budget.
//! - `Measure` / `WaitMeasurement`: read a sample every measurement interval. Failed or
//!   out-of-range reads consume the measure retry budget, which refills on every valid
//!   sample.
//!
//! Exhausting a budget is fatal and sticky until [`Sensor::reinitialize`].

use crate::device::{ConversionFactors, Device, GasType, Sample, PRODUCT_NUMBER};
use crate::error::{BusError, SensorError, StepError};
use crate::i2c::I2cDevice;
use crate::state_machine::{Action, StateMachine};
use data_validator::{ValidationConfig, Validator};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSensorConfig {
    /// Gas calibration to measure with
    pub gas: GasType,
    /// Wait after starting measurement (µs)
    pub warmup_us: u32,
    /// Wait between measurements (µs)
    pub measure_interval_us: u32,
    /// Lowest plausible flow (L/min)
    pub flow_min: f64,
    /// Highest plausible flow (L/min)
    pub flow_max: f64,
    /// Failures tolerated across all setup steps
    pub max_retries_setup: u32,
    /// Failures tolerated between two valid samples
    pub max_retries_measure: u32,
    /// Whether this sensor issues the bus-wide general call reset. Only one sensor per
    /// bus should.
    pub resetter: bool,
}

impl Default for FlowSensorConfig {
    fn default() -> Self {
        Self {
            gas: GasType::Air,
            warmup_us: 30_000,
            measure_interval_us: 500,
            flow_min: -200.0,
            flow_max: 200.0,
            max_retries_setup: 8,
            max_retries_measure: 8,
            resetter: true,
        }
    }
}

/// SFM3019 flow sensor
pub struct Sensor<D> {
    device: Device<D>,
    config: FlowSensorConfig,
    validator: Validator,
    fsm: StateMachine,
    next_action: Action,
    retry_count: u32,
    conversion: Option<ConversionFactors>,
    failure: Option<SensorError>,
    latest: Option<Sample>,
}

impl<D: I2cDevice> Sensor<D> {
    pub fn new(device: Device<D>, config: FlowSensorConfig) -> Self {
        let validator = Validator::new(ValidationConfig {
            flow_range: (config.flow_min, config.flow_max),
            ..ValidationConfig::default()
        });
        let fsm = StateMachine::new(config.warmup_us, config.measure_interval_us);
        Self {
            device,
            config,
            validator,
            next_action: fsm.next_action(),
            fsm,
            retry_count: 0,
            conversion: None,
            failure: None,
            latest: None,
        }
    }

    /// Run one step
    ///
    /// Returns `Ok(Some(sample))` when a new valid sample was read, `Ok(None)` when there
    /// is nothing new yet, and `Err` once a retry budget is exhausted.
    pub fn update(&mut self, now_us: u32) -> Result<Option<Sample>, SensorError> {
        if let Some(failure) = self.failure {
            return Err(failure);
        }

        match self.next_action {
            Action::Initialize => {
                self.initialize(now_us);
                Ok(None)
            }
            Action::WaitWarmup | Action::WaitMeasurement => {
                self.next_action = self.fsm.update(now_us);
                Ok(None)
            }
            Action::CheckRange => self.check_range(now_us),
            Action::Measure => self.measure(now_us),
        }
    }

    fn initialize(&mut self, now_us: u32) {
        if self.config.resetter {
            if let Err(err) = self.device.reset() {
                warn!(error = %err, "SFM3019 general call reset failed");
            }
        }
        if let Err(err) = self.device.start_measure() {
            warn!(error = %err, "SFM3019 start measurement failed");
        }
        self.retry_count = 0;
        self.next_action = self.fsm.update(now_us);
        info!(gas = ?self.config.gas, "SFM3019 warming up");
    }

    fn check_range(&mut self, now_us: u32) -> Result<Option<Sample>, SensorError> {
        let Some(conversion) = self.conversion else {
            return match self.identify() {
                Ok(conversion) => {
                    debug!(?conversion, "SFM3019 conversion factors loaded");
                    self.conversion = Some(conversion);
                    // Measurement was just restarted; no sample exists until it warms up
                    self.next_action = self.fsm.restart_warmup(now_us);
                    Ok(None)
                }
                Err(reason) => self.setup_retry(reason),
            };
        };

        let sample = match self.read_valid_sample(&conversion) {
            Ok(sample) => sample,
            Err(reason) => return self.setup_retry(reason),
        };

        info!(flow = sample.flow, retries = self.retry_count, "SFM3019 ready");
        self.retry_count = 0;
        self.latest = Some(sample);
        self.next_action = self.fsm.update(now_us);
        Ok(Some(sample))
    }

    /// Check the product id and read the conversion factors, restarting measurement after
    fn identify(&mut self) -> Result<ConversionFactors, StepError> {
        if let Err(err) = self.device.stop_measure() {
            debug!(error = %err, "SFM3019 stop measurement failed");
        }
        let result = self.read_identity();
        if let Err(err) = self.device.start_measure() {
            warn!(error = %err, "SFM3019 start measurement failed");
        }
        result
    }

    fn read_identity(&mut self) -> Result<ConversionFactors, StepError> {
        let found = self.device.read_product_id()?;
        if found != PRODUCT_NUMBER {
            return Err(StepError::UnexpectedProduct { found });
        }
        self.device.request_conversion_factors()?;
        let conversion = self.device.read_conversion_factors()?;
        if conversion.scale_factor == 0 {
            return Err(BusError::InvalidArguments.into());
        }
        Ok(conversion)
    }

    fn read_valid_sample(&mut self, conversion: &ConversionFactors) -> Result<Sample, StepError> {
        let sample = self.device.read_sample(conversion)?;
        self.validator.validate_flow(f64::from(sample.flow))?;
        Ok(sample)
    }

    fn setup_retry(&mut self, reason: StepError) -> Result<Option<Sample>, SensorError> {
        self.retry_count += 1;
        warn!(reason = %reason, retries = self.retry_count, "SFM3019 setup step failed");
        if self.retry_count > self.config.max_retries_setup {
            let failure = SensorError::SetupFailed {
                retries: self.retry_count,
            };
            error!(error = %failure, "SFM3019 setup abandoned");
            self.failure = Some(failure);
            return Err(failure);
        }
        Ok(None)
    }

    fn measure(&mut self, now_us: u32) -> Result<Option<Sample>, SensorError> {
        let sample = match self.conversion {
            Some(conversion) => self.read_valid_sample(&conversion),
            None => Err(StepError::NotIdentified),
        };

        match sample {
            Ok(sample) => {
                self.retry_count = 0;
                self.latest = Some(sample);
                self.next_action = self.fsm.update(now_us);
                Ok(Some(sample))
            }
            Err(reason) => {
                self.retry_count += 1;
                warn!(reason = %reason, retries = self.retry_count, "SFM3019 measurement rejected");
                if self.retry_count > self.config.max_retries_measure {
                    let failure = SensorError::MeasurementFailed {
                        retries: self.retry_count,
                    };
                    error!(error = %failure, "SFM3019 measurement abandoned");
                    self.failure = Some(failure);
                    return Err(failure);
                }
                Ok(None)
            }
        }
    }

    /// Clear a failure and start over from `Initialize`
    pub fn reinitialize(&mut self) {
        info!("SFM3019 reinitializing");
        self.fsm.reset();
        self.next_action = self.fsm.next_action();
        self.retry_count = 0;
        self.conversion = None;
        self.failure = None;
    }

    /// Latest valid flow (L/min)
    pub fn flow(&self) -> Option<f32> {
        self.latest.map(|sample| sample.flow)
    }

    pub fn next_action(&self) -> Action {
        self.next_action
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn failure(&self) -> Option<SensorError> {
        self.failure
    }

    pub fn device_mut(&mut self) -> &mut Device<D> {
        &mut self.device
    }
}
