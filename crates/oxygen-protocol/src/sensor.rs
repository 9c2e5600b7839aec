//! FDO2 Sensor
//!
//! High-level driver: checks the device version, starts measurement broadcasts, then
//! reports oxygen partial pressure from each `#MRAW` broadcast.

use crate::command::{CommandType, Measurement, Response, Version};
use crate::device::Device;
use crate::error::SensorError;
use data_validator::Validator;
use serde::{Deserialize, Serialize};
use serial_channel::{within_timeout, ByteChannel, Clock};
use tracing::{debug, error, info, warn};

/// Sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OxygenSensorConfig {
    /// `#MRAW` broadcast interval (ms)
    pub broadcast_interval_ms: u16,
    /// Time to wait for each setup response (ms)
    pub request_timeout_ms: u32,
    /// Failed setup checks tolerated before giving up
    pub max_retries_setup: u32,
    /// Device id the `#VERS` response must report
    pub expected_device_id: u8,
    /// Channel count the `#VERS` response must report
    pub expected_num_channels: u8,
}

impl Default for OxygenSensorConfig {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 100,
            request_timeout_ms: 50,
            max_retries_setup: 8,
            expected_device_id: 8,
            expected_num_channels: 1,
        }
    }
}

/// Setup step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    RequestVersion,
    CheckVersion,
    StartBroadcast,
    CheckBroadcast,
    WaitMeasurement,
}

/// Moore machine sequencing sensor setup
#[derive(Debug, Clone)]
pub struct StateMachine {
    next_action: Action,
    request_time: u32,
    response_timeout_ms: u32,
}

impl StateMachine {
    pub fn new(response_timeout_ms: u32) -> Self {
        Self {
            next_action: Action::RequestVersion,
            request_time: 0,
            response_timeout_ms,
        }
    }

    /// Advance from the current action
    ///
    /// `passed_check` is whether the response awaited by a check step has arrived and
    /// matched. A check step that times out falls back to re-sending its request.
    pub fn update(&mut self, now_ms: u32, passed_check: bool) -> Action {
        self.next_action = match self.next_action {
            Action::RequestVersion => {
                self.request_time = now_ms;
                Action::CheckVersion
            }
            Action::CheckVersion if passed_check => Action::StartBroadcast,
            Action::CheckVersion if self.timed_out(now_ms) => Action::RequestVersion,
            Action::StartBroadcast => {
                self.request_time = now_ms;
                Action::CheckBroadcast
            }
            Action::CheckBroadcast if passed_check => Action::WaitMeasurement,
            Action::CheckBroadcast if self.timed_out(now_ms) => Action::StartBroadcast,
            unchanged => unchanged,
        };
        self.next_action
    }

    fn timed_out(&self, now_ms: u32) -> bool {
        !within_timeout(self.request_time, self.response_timeout_ms, now_ms)
    }

    pub fn next_action(&self) -> Action {
        self.next_action
    }
}

/// Progress of [`Sensor::setup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupStatus {
    /// Still exchanging setup commands
    InProgress,
    /// Broadcasting measurements
    Ready,
}

/// Oxygen measurement in engineering units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OxygenReading {
    /// Oxygen partial pressure (hPa)
    pub po2_hpa: f64,
    /// Sample temperature (°C)
    pub temperature_c: f64,
    /// Ambient air pressure (hPa)
    pub ambient_pressure_hpa: f64,
    /// Relative humidity (%)
    pub relative_humidity: f64,
    /// Raw status bitfield
    pub status: u32,
}

impl From<&Measurement> for OxygenReading {
    fn from(raw: &Measurement) -> Self {
        let scale = |value: i32| f64::from(value) / 1000.0;
        Self {
            po2_hpa: scale(raw.po2),
            temperature_c: scale(raw.temperature),
            ambient_pressure_hpa: scale(raw.ambient_pressure),
            relative_humidity: scale(raw.relative_humidity),
            status: raw.status,
        }
    }
}

/// FDO2 oxygen sensor
pub struct Sensor<C, K> {
    device: Device<C>,
    clock: K,
    validator: Validator,
    config: OxygenSensorConfig,
    fsm: StateMachine,
    next_action: Action,
    retry_count: u32,
    latest: Option<OxygenReading>,
}

impl<C: ByteChannel, K: Clock> Sensor<C, K> {
    pub fn new(device: Device<C>, clock: K, validator: Validator, config: OxygenSensorConfig) -> Self {
        let fsm = StateMachine::new(config.request_timeout_ms);
        Self {
            device,
            clock,
            validator,
            config,
            next_action: fsm.next_action(),
            fsm,
            retry_count: 0,
            latest: None,
        }
    }

    /// Run one setup step
    pub fn setup(&mut self) -> Result<SetupStatus, SensorError> {
        if self.retry_count > self.config.max_retries_setup {
            return Err(SensorError::SetupFailed {
                retries: self.retry_count,
            });
        }

        let now = self.clock.millis();
        match self.next_action {
            Action::RequestVersion => {
                if let Err(err) = self.device.request_version() {
                    warn!(error = %err, "Failed to queue version request");
                }
                self.next_action = self.fsm.update(now, false);
            }
            Action::CheckVersion => {
                let expected_id = self.config.expected_device_id;
                let expected_channels = self.config.expected_num_channels;
                self.check(now, CommandType::Vers, |response| {
                    matches!(response, Response::Version(Version { device_id, num_channels, .. })
                        if *device_id == expected_id && *num_channels == expected_channels)
                });
            }
            Action::StartBroadcast => {
                if let Err(err) = self.device.start_broadcast() {
                    warn!(error = %err, "Failed to queue broadcast request");
                }
                self.next_action = self.fsm.update(now, false);
            }
            Action::CheckBroadcast => {
                let interval_ms = self.config.broadcast_interval_ms;
                self.check(now, CommandType::Bcst, |response| {
                    *response == Response::Broadcast { interval_ms }
                });
            }
            Action::WaitMeasurement => return Ok(SetupStatus::Ready),
        }

        if self.next_action == Action::WaitMeasurement {
            info!(retries = self.retry_count, "FDO2 setup complete");
            return Ok(SetupStatus::Ready);
        }
        Ok(SetupStatus::InProgress)
    }

    /// Wait for a response of `expected` type and check it with `accept`
    fn check<F>(&mut self, now: u32, expected: CommandType, accept: F)
    where
        F: FnOnce(&Response) -> bool,
    {
        let Some(response) = self.find_response(expected) else {
            let waiting_in = self.next_action;
            self.next_action = self.fsm.update(now, false);
            if self.next_action != waiting_in {
                self.retry_count += 1;
                warn!(
                    ?expected,
                    retries = self.retry_count,
                    "FDO2 response timed out"
                );
            }
            return;
        };

        if accept(&response) {
            self.next_action = self.fsm.update(now, true);
        } else {
            self.retry_count += 1;
            warn!(?response, retries = self.retry_count, "Unexpected FDO2 response");
            self.next_action = self.fsm.update(now, false);
        }
    }

    /// Drain responses until one of `expected` type turns up
    fn find_response(&mut self, expected: CommandType) -> Option<Response> {
        loop {
            match self.device.receive() {
                Ok(Some(response)) if response.command_type() == expected => {
                    return Some(response)
                }
                Ok(Some(response)) => debug!(?response, "Skipping FDO2 response"),
                Ok(None) => return None,
                Err(err) => warn!(error = %err, "Invalid FDO2 response"),
            }
        }
    }

    /// Process received broadcasts, returning the newest valid reading if any arrived
    pub fn output(&mut self) -> Result<Option<OxygenReading>, SensorError> {
        if self.next_action != Action::WaitMeasurement {
            return Err(SensorError::NotReady);
        }

        let mut newest = None;
        loop {
            match self.device.receive() {
                Ok(Some(Response::Measurement(raw))) => {
                    let reading = OxygenReading::from(&raw);
                    match self.validator.validate_po2(reading.po2_hpa) {
                        Ok(()) => newest = Some(reading),
                        Err(err) => warn!(error = %err, "Rejecting FDO2 measurement"),
                    }
                }
                Ok(Some(Response::Error { code })) => error!(code, "FDO2 reported an error"),
                Ok(Some(response)) => debug!(?response, "Skipping FDO2 response"),
                Ok(None) => break,
                Err(err) => warn!(error = %err, "Invalid FDO2 response"),
            }
        }

        if newest.is_some() {
            self.latest = newest;
        }
        Ok(newest)
    }

    /// Latest valid oxygen partial pressure (hPa)
    pub fn po2(&self) -> Option<f64> {
        self.latest.map(|reading| reading.po2_hpa)
    }

    pub fn next_action(&self) -> Action {
        self.next_action
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn device_mut(&mut self) -> &mut Device<C> {
        &mut self.device
    }
}
