//! Nonin Packet Measurements

use crate::packet::{Packet, PacketDecoder};
use crate::{status, PACKET_FRAMES};
use serde::{Deserialize, Serialize};

/// Packet decoder with the Nonin 25-frame layout
pub type NoninPacketDecoder = PacketDecoder<PACKET_FRAMES>;

/// Frame slots of each measurement within a packet
mod slot {
    pub const HR_MSB: usize = 0;
    pub const HR_LSB: usize = 1;
    pub const SPO2: usize = 2;
    pub const REVISION: usize = 3;
    pub const SPO2_D: usize = 8;
    pub const SPO2_FAST: usize = 9;
    pub const SPO2_BEAT: usize = 10;
    pub const E_HR_MSB: usize = 13;
    pub const E_HR_LSB: usize = 14;
    pub const E_SPO2: usize = 15;
    pub const E_SPO2_D: usize = 16;
    pub const HR_D_MSB: usize = 19;
    pub const HR_D_LSB: usize = 20;
    pub const E_HR_D_MSB: usize = 21;
    pub const E_HR_D_LSB: usize = 22;
}

/// Signal amplitude reported in the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Perfusion {
    #[default]
    None,
    Red,
    Yellow,
    Green,
}

/// Decoded status byte of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusFlags {
    pub sensor_disconnect: bool,
    pub artifact: bool,
    pub out_of_track: bool,
    pub sensor_alarm: bool,
    pub perfusion: Perfusion,
}

impl StatusFlags {
    pub fn from_byte(byte: u8) -> Self {
        let perfusion = match byte & status::PERFUSION_MASK {
            0x06 => Perfusion::Yellow,
            0x04 => Perfusion::Red,
            0x02 => Perfusion::Green,
            _ => Perfusion::None,
        };
        Self {
            sensor_disconnect: byte & status::SENSOR_DISCONNECT != 0,
            artifact: byte & status::ARTIFACT != 0,
            out_of_track: byte & status::OUT_OF_TRACK != 0,
            sensor_alarm: byte & status::SENSOR_ALARM != 0,
            perfusion,
        }
    }
}

/// Measurements carried by one Nonin packet
///
/// Values are raw device units. 127 for an SpO2 field and 511 for a heart rate field
/// mean the device has no value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PacketMeasurements {
    /// 4-beat heart rate average (bpm)
    pub heart_rate: u16,
    /// 4-beat SpO2 average (%)
    pub spo2: u8,
    /// Firmware revision level
    pub firmware_revision: u8,
    /// 4-beat SpO2 average for display
    pub spo2_d: u8,
    /// SpO2 fast average
    pub spo2_d_fast: u8,
    /// SpO2 beat-to-beat value
    pub spo2_d_beat: u8,
    /// 8-beat extended heart rate average
    pub e_heart_rate: u16,
    /// 8-beat extended SpO2 average
    pub e_spo2: u8,
    /// 8-beat extended SpO2 average for display
    pub e_spo2_d: u8,
    /// 4-beat heart rate average for display
    pub heart_rate_d: u16,
    /// 8-beat extended heart rate average for display
    pub e_heart_rate_d: u16,
    /// Plethysmographic waveform samples, one per frame
    pub pleth: [u8; PACKET_FRAMES],
    /// Status flags, one per frame
    pub status: [StatusFlags; PACKET_FRAMES],
}

/// SpO2 fields use the low 7 bits
fn read_7bit(packet: &Packet<PACKET_FRAMES>, slot: usize) -> u8 {
    packet.read_u8(slot) & 0x7F
}

/// Heart rate fields carry 2 bits in the MSB frame and 7 bits in the LSB frame
fn read_9bit(packet: &Packet<PACKET_FRAMES>, msb: usize, lsb: usize) -> u16 {
    let msb = u16::from(packet.read_u8(msb) & 0x03);
    let lsb = u16::from(packet.read_u8(lsb) & 0x7F);
    (msb << 7) | lsb
}

impl PacketMeasurements {
    /// Value of an SpO2 field meaning "no data"
    pub const SPO2_UNAVAILABLE: u8 = 127;
    /// Value of a heart rate field meaning "no data"
    pub const HEART_RATE_UNAVAILABLE: u16 = 511;

    pub fn from_packet(packet: &Packet<PACKET_FRAMES>) -> Self {
        let frames = packet.frames();
        Self {
            heart_rate: read_9bit(packet, slot::HR_MSB, slot::HR_LSB),
            spo2: read_7bit(packet, slot::SPO2),
            firmware_revision: packet.read_u8(slot::REVISION),
            spo2_d: read_7bit(packet, slot::SPO2_D),
            spo2_d_fast: read_7bit(packet, slot::SPO2_FAST),
            spo2_d_beat: read_7bit(packet, slot::SPO2_BEAT),
            e_heart_rate: read_9bit(packet, slot::E_HR_MSB, slot::E_HR_LSB),
            e_spo2: read_7bit(packet, slot::E_SPO2),
            e_spo2_d: read_7bit(packet, slot::E_SPO2_D),
            heart_rate_d: read_9bit(packet, slot::HR_D_MSB, slot::HR_D_LSB),
            e_heart_rate_d: read_9bit(packet, slot::E_HR_D_MSB, slot::E_HR_D_LSB),
            pleth: frames.map(|frame| frame.pleth()),
            status: frames.map(|frame| StatusFlags::from_byte(frame.status())),
        }
    }

    /// Whether any frame of the packet flagged a disconnected sensor
    pub fn sensor_disconnected(&self) -> bool {
        self.status.iter().any(|flags| flags.sensor_disconnect)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::frame::Frame;

    /// Build the 25 frames of a packet from per-slot DATA bytes
    pub(crate) fn packet_frames(data: [u8; PACKET_FRAMES], flags: u8) -> Vec<Frame> {
        data.iter()
            .enumerate()
            .map(|(slot, &byte)| {
                let sync = if slot == 0 { status::SYNC } else { 0 };
                Frame::new(status::BIT7 | flags | sync, slot as u8, byte)
            })
            .collect()
    }

    pub(crate) fn sample_data() -> [u8; PACKET_FRAMES] {
        let mut data = [0u8; PACKET_FRAMES];
        data[slot::HR_MSB] = 0x00;
        data[slot::HR_LSB] = 0x48;
        data[slot::SPO2] = 97;
        data[slot::REVISION] = 0x2A;
        data[slot::SPO2_D] = 96;
        data[slot::SPO2_FAST] = 95;
        data[slot::SPO2_BEAT] = 94;
        data[slot::E_HR_MSB] = 0x01;
        data[slot::E_HR_LSB] = 0x04;
        data[slot::E_SPO2] = 98;
        data[slot::E_SPO2_D] = 99;
        data[slot::HR_D_MSB] = 0x00;
        data[slot::HR_D_LSB] = 0x4B;
        data[slot::E_HR_D_MSB] = 0x03;
        data[slot::E_HR_D_LSB] = 0x7F;
        data
    }

    fn decode(frames: &[Frame]) -> PacketMeasurements {
        let mut decoder = NoninPacketDecoder::new();
        let mut last = None;
        for &frame in frames {
            last = Some(decoder.input(frame));
        }
        assert_eq!(last, Some(crate::PacketStatus::Available));
        PacketMeasurements::from_packet(&decoder.output().unwrap())
    }

    #[test]
    fn test_measurement_fields() {
        let measurements = decode(&packet_frames(sample_data(), 0x02));
        assert_eq!(measurements.heart_rate, 72);
        assert_eq!(measurements.spo2, 97);
        assert_eq!(measurements.firmware_revision, 0x2A);
        assert_eq!(measurements.spo2_d, 96);
        assert_eq!(measurements.spo2_d_fast, 95);
        assert_eq!(measurements.spo2_d_beat, 94);
        assert_eq!(measurements.e_heart_rate, 132);
        assert_eq!(measurements.e_spo2, 98);
        assert_eq!(measurements.e_spo2_d, 99);
        assert_eq!(measurements.heart_rate_d, 75);
        assert_eq!(measurements.e_heart_rate_d, 511);
        assert_eq!(measurements.pleth[7], 7);
        assert!(measurements
            .status
            .iter()
            .all(|flags| flags.perfusion == Perfusion::Green));
        assert!(!measurements.sensor_disconnected());
    }

    #[test]
    fn test_status_flags() {
        let flags = StatusFlags::from_byte(0x80 | 0x40 | 0x08 | 0x06);
        assert!(flags.sensor_disconnect);
        assert!(flags.sensor_alarm);
        assert!(!flags.artifact);
        assert!(!flags.out_of_track);
        assert_eq!(flags.perfusion, Perfusion::Yellow);

        let flags = StatusFlags::from_byte(0x80 | 0x20 | 0x10 | 0x04);
        assert!(flags.artifact);
        assert!(flags.out_of_track);
        assert_eq!(flags.perfusion, Perfusion::Red);
        assert_eq!(StatusFlags::from_byte(0x81).perfusion, Perfusion::None);
    }

    #[test]
    fn test_disconnect_flag_in_any_frame() {
        let mut frames = packet_frames(sample_data(), 0x00);
        frames[12] = Frame::new(0x80 | status::SENSOR_DISCONNECT, 12, 0);
        assert!(decode(&frames).sensor_disconnected());
    }
}
