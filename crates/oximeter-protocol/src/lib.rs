//! Nonin OEM III Protocol Implementation
//!
//! Decodes the serial data format 2 stream of a Nonin OEM III pulse oximetry module.
//! Bytes are framed into checksummed 5-byte frames, and 25 consecutive frames starting
//! at a SYNC frame form one packet of measurements.

mod device;
mod error;
mod frame;
mod measurements;
mod packet;
mod sensor;

pub use device::Device;
pub use error::FramingError;
pub use frame::{Frame, FrameDecoder, FrameStatus, FRAME_LEN};
pub use measurements::{NoninPacketDecoder, PacketMeasurements, Perfusion, StatusFlags};
pub use packet::{Packet, PacketDecoder, PacketStatus};
pub use sensor::{Reading, Sensor, SensorStats};

/// Number of frames in one Nonin packet
pub const PACKET_FRAMES: usize = 25;

/// Status byte bit masks
pub mod status {
    /// Always set in a valid status byte
    pub const BIT7: u8 = 0x80;
    /// Sensor disconnected
    pub const SENSOR_DISCONNECT: u8 = 0x40;
    /// Artifact detected in the pulse
    pub const ARTIFACT: u8 = 0x20;
    /// Out of track: no consecutive good pulses
    pub const OUT_OF_TRACK: u8 = 0x10;
    /// Sensor alarm: the device is providing unusable data
    pub const SENSOR_ALARM: u8 = 0x08;
    /// Perfusion amplitude bits
    pub const PERFUSION_MASK: u8 = 0x06;
    /// Set only on the first frame of a packet
    pub const SYNC: u8 = 0x01;
}
