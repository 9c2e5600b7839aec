//! Nonin Sensor
//!
//! Polls the device and turns complete packets into validated readings.

use crate::device::Device;
use crate::measurements::{PacketMeasurements, Perfusion};
use crate::packet::PacketStatus;
use data_validator::Validator;
use serde::{Deserialize, Serialize};
use serial_channel::ByteChannel;
use tracing::{debug, warn};

/// Upper bound on bytes consumed per [`Sensor::update`], keeps each poll short
const MAX_BYTES_PER_UPDATE: usize = 32;

/// Validated oximeter reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// SpO2 (%), `None` when the device has no value or it failed validation
    pub spo2: Option<f32>,
    /// Heart rate (bpm), `None` when the device has no value or it failed validation
    pub heart_rate: Option<u16>,
    /// Any frame of the packet flagged a disconnected sensor
    pub sensor_disconnected: bool,
    /// Signal amplitude of the last frame
    pub perfusion: Perfusion,
}

/// Decoding counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStats {
    pub packets: u32,
    pub framing_errors: u32,
    pub missed_data: u32,
}

/// Pulse oximeter sensor
pub struct Sensor<C> {
    device: Device<C>,
    validator: Validator,
    latest: Option<Reading>,
    stats: SensorStats,
}

impl<C: ByteChannel> Sensor<C> {
    pub fn new(device: Device<C>, validator: Validator) -> Self {
        Self {
            device,
            validator,
            latest: None,
            stats: SensorStats::default(),
        }
    }

    /// Process buffered bytes, returning a reading if a packet completed
    pub fn update(&mut self) -> Option<Reading> {
        for _ in 0..MAX_BYTES_PER_UPDATE {
            match self.device.output() {
                Ok(PacketStatus::Waiting) => {}
                Ok(PacketStatus::MissedData) => {
                    self.stats.missed_data = self.stats.missed_data.saturating_add(1);
                }
                Ok(PacketStatus::Available) => {
                    self.stats.packets = self.stats.packets.saturating_add(1);
                    let Some(measurements) = self.device.measurements() else {
                        continue;
                    };
                    let reading = self.reading(&measurements);
                    debug!(?reading, "Oximeter packet decoded");
                    self.latest = Some(reading.clone());
                    return Some(reading);
                }
                Err(err) => {
                    self.stats.framing_errors = self.stats.framing_errors.saturating_add(1);
                    warn!(error = %err, "Oximeter framing error");
                }
            }
        }
        None
    }

    fn reading(&self, measurements: &PacketMeasurements) -> Reading {
        let spo2 = (measurements.spo2 != PacketMeasurements::SPO2_UNAVAILABLE)
            .then_some(measurements.spo2)
            .filter(|&v| self.validator.validate_spo2(f64::from(v)).is_ok())
            .map(f32::from);
        let heart_rate = (measurements.heart_rate != PacketMeasurements::HEART_RATE_UNAVAILABLE)
            .then_some(measurements.heart_rate)
            .filter(|&v| self.validator.validate_heart_rate(f64::from(v)).is_ok());

        Reading {
            spo2,
            heart_rate,
            sensor_disconnected: measurements.sensor_disconnected(),
            perfusion: measurements.status[measurements.status.len() - 1].perfusion,
        }
    }

    /// Latest SpO2 (%), if the last packet carried a valid one
    pub fn spo2(&self) -> Option<f32> {
        self.latest.as_ref().and_then(|reading| reading.spo2)
    }

    /// Latest reading
    pub fn latest(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    pub fn stats(&self) -> SensorStats {
        self.stats
    }

    pub fn device_mut(&mut self) -> &mut Device<C> {
        &mut self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::measurements::tests::{packet_frames, sample_data};
    use serial_channel::mock::MockTransport;
    use serial_channel::{ChannelBuffers, ChannelConfig};

    fn to_bytes(frames: &[Frame]) -> Vec<u8> {
        frames.iter().flat_map(|frame| *frame.as_bytes()).collect()
    }

    fn run(bytes: &[u8]) -> (Vec<Reading>, SensorStats) {
        let mut buffers = ChannelBuffers::<1024, 16>::new();
        let (channel, mut service) =
            buffers.split(MockTransport::with_rx(bytes), ChannelConfig::default());
        service.service_rx();

        let mut sensor = Sensor::new(Device::new(channel), Validator::default());
        let mut readings = Vec::new();
        for _ in 0..bytes.len() {
            if let Some(reading) = sensor.update() {
                readings.push(reading);
            }
        }
        (readings, sensor.stats())
    }

    #[test]
    fn test_valid_reading() {
        let (readings, stats) = run(&to_bytes(&packet_frames(sample_data(), 0x02)));
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].spo2, Some(97.0));
        assert_eq!(readings[0].heart_rate, Some(72));
        assert_eq!(readings[0].perfusion, Perfusion::Green);
        assert!(!readings[0].sensor_disconnected);
        assert_eq!(stats.packets, 1);
    }

    #[test]
    fn test_unavailable_values_map_to_none() {
        let mut data = sample_data();
        data[2] = PacketMeasurements::SPO2_UNAVAILABLE;
        data[0] = 0x03;
        data[1] = 0x7F;
        let (readings, _) = run(&to_bytes(&packet_frames(data, 0x40)));
        assert_eq!(readings[0].spo2, None);
        assert_eq!(readings[0].heart_rate, None);
        assert!(readings[0].sensor_disconnected);
    }

    #[test]
    fn test_out_of_range_spo2_rejected() {
        let mut data = sample_data();
        data[2] = 120;
        let (readings, _) = run(&to_bytes(&packet_frames(data, 0x02)));
        assert_eq!(readings[0].spo2, None);
        assert_eq!(readings[0].heart_rate, Some(72));
    }

    #[test]
    fn test_counts_missed_data_and_framing_errors() {
        let frames = packet_frames(sample_data(), 0x02);
        let mut bytes = to_bytes(&frames[..10]);
        // Packet cut short, then a corrupt frame, then a full packet
        bytes.extend(to_bytes(&frames));
        bytes.extend_from_slice(&[0x01, 0x80, 0x00, 0x00, 0x00]);
        bytes.extend(to_bytes(&frames));

        let (readings, stats) = run(&bytes);
        assert_eq!(stats.missed_data, 1);
        assert_eq!(stats.framing_errors, 1);
        assert_eq!(readings.len(), 2);
        assert_eq!(stats.packets, 2);
    }
}
