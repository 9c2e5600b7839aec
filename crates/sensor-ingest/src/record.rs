//! JSON line output

use oximeter_protocol::{Reading, SensorStats};
use oxygen_protocol::OxygenReading;
use serde::Serialize;
use std::io::Write;

/// One output line
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Oximeter {
        elapsed_ms: u32,
        #[serde(flatten)]
        reading: Reading,
    },
    Oxygen {
        elapsed_ms: u32,
        #[serde(flatten)]
        reading: OxygenReading,
    },
    Stats {
        elapsed_ms: u32,
        /// RX bytes lost since the previous stats record
        rx_dropped: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        oximeter: Option<SensorStats>,
    },
}

/// Write `record` as a single JSON line
pub fn write_record<W: Write>(out: &mut W, record: &Record) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
