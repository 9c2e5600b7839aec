//! Byte sources for the service thread

use crate::config::{IngestConfig, SourceKind};
use serial_channel::Transport;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_serial::SerialPort;
use tracing::{debug, info, warn};

/// Failures opening a source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to open serial port {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("Failed to read replay file {path}: {source}")]
    Replay {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Host serial port polled without blocking
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    rx: [u8; 64],
    rx_len: usize,
    rx_pos: usize,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, SourceError> {
        let port = tokio_serial::new(path, baud_rate)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|source| SourceError::Serial {
                path: path.to_string(),
                source,
            })?;
        info!(path, baud_rate, "Serial port opened");
        Ok(Self {
            port,
            rx: [0; 64],
            rx_len: 0,
            rx_pos: 0,
        })
    }

    fn refill(&mut self) {
        match self.port.bytes_to_read() {
            Ok(0) => return,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Serial status query failed");
                return;
            }
        }
        match self.port.read(&mut self.rx) {
            Ok(n) => {
                self.rx_len = n;
                self.rx_pos = 0;
            }
            Err(err) if err.kind() == ErrorKind::TimedOut => {}
            Err(err) => warn!(error = %err, "Serial read failed"),
        }
    }
}

impl Transport for SerialTransport {
    fn poll_receive(&mut self) -> Option<u8> {
        if self.rx_pos == self.rx_len {
            self.refill();
        }
        if self.rx_pos < self.rx_len {
            let byte = self.rx[self.rx_pos];
            self.rx_pos += 1;
            Some(byte)
        } else {
            None
        }
    }

    fn try_transmit(&mut self, byte: u8) -> bool {
        matches!(self.port.write(&[byte]), Ok(1))
    }
}

/// Recorded byte stream played back at a bounded rate
///
/// Delivers at most `bytes_per_poll` bytes per service pass, like a UART at a fixed baud
/// rate. Transmitted bytes are accepted and discarded.
pub struct ReplayTransport {
    data: Vec<u8>,
    pos: usize,
    bytes_per_poll: usize,
    budget: usize,
    exhausted: Arc<AtomicBool>,
}

impl ReplayTransport {
    pub fn new(data: Vec<u8>, bytes_per_poll: usize) -> Self {
        let exhausted = Arc::new(AtomicBool::new(data.is_empty()));
        Self {
            data,
            pos: 0,
            bytes_per_poll: bytes_per_poll.max(1),
            budget: 0,
            exhausted,
        }
    }

    pub fn open(path: &Path, bytes_per_poll: usize) -> Result<Self, SourceError> {
        let data = std::fs::read(path).map_err(|source| SourceError::Replay {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), bytes = data.len(), "Replay loaded");
        Ok(Self::new(data, bytes_per_poll))
    }

    /// Flag raised once every byte has been delivered
    pub fn exhausted_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exhausted)
    }
}

impl Transport for ReplayTransport {
    fn poll_receive(&mut self) -> Option<u8> {
        // Raised only on the poll after the last byte, once that byte has been buffered
        let Some(&byte) = self.data.get(self.pos) else {
            if !self.exhausted.swap(true, Ordering::Release) {
                debug!(bytes = self.pos, "Replay exhausted");
            }
            return None;
        };
        if self.budget == 0 {
            // End of this pass; the next one gets a fresh budget
            self.budget = self.bytes_per_poll;
            return None;
        }
        self.pos += 1;
        self.budget -= 1;
        Some(byte)
    }

    fn try_transmit(&mut self, _byte: u8) -> bool {
        true
    }
}

/// A transport plus, for finite sources, its end-of-input flag
pub struct Source {
    pub transport: Box<dyn Transport + Send>,
    exhausted: Option<Arc<AtomicBool>>,
}

impl Source {
    pub fn open(config: &IngestConfig) -> Result<Self, SourceError> {
        match config.source {
            SourceKind::Serial => {
                let transport = SerialTransport::open(&config.path, config.baud_rate())?;
                Ok(Self {
                    transport: Box::new(transport),
                    exhausted: None,
                })
            }
            SourceKind::Replay => {
                let replay =
                    ReplayTransport::open(Path::new(&config.path), config.replay_bytes_per_poll)?;
                Ok(Self::replay(replay))
            }
        }
    }

    pub fn replay(replay: ReplayTransport) -> Self {
        Self {
            exhausted: Some(replay.exhausted_flag()),
            transport: Box::new(replay),
        }
    }

    /// Whether a finite source has delivered everything; never true for a serial port
    pub fn is_exhausted(&self) -> bool {
        is_exhausted(self.exhausted.as_deref())
    }

    /// Split into the transport and a handle that answers [`Source::is_exhausted`]
    pub fn into_parts(self) -> (Box<dyn Transport + Send>, ExhaustedHandle) {
        (self.transport, ExhaustedHandle(self.exhausted))
    }
}

fn is_exhausted(flag: Option<&AtomicBool>) -> bool {
    flag.is_some_and(|flag| flag.load(Ordering::Acquire))
}

/// End-of-input flag detached from its transport
#[derive(Debug, Clone)]
pub struct ExhaustedHandle(Option<Arc<AtomicBool>>);

impl ExhaustedHandle {
    pub fn is_exhausted(&self) -> bool {
        is_exhausted(self.0.as_deref())
    }
}
