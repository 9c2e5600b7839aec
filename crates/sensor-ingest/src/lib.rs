//! Sensor Ingest
//!
//! Runs the ventilator sensor ingestion layer on a host. Bytes come from a serial port
//! or a recorded capture, flow through a buffered channel into the Nonin or FDO2 driver,
//! and leave as JSON lines on stdout.

pub mod config;
mod logging;
pub mod record;
mod runner;
pub mod source;

pub use config::{IngestConfig, SensorKind, SourceKind};
pub use logging::init_logging;
pub use runner::{run, RunSummary};
pub use source::{ReplayTransport, SerialTransport, Source, SourceError};
