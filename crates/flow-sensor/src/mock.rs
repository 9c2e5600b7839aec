//! Deterministic I2C device for tests

use crate::error::BusError;
use crate::i2c::I2cDevice;
use data_validator::{Checksum, Crc8};
use std::collections::VecDeque;

/// Scripted [`I2cDevice`]
///
/// Each `read` consumes the next scripted response; with none left it fails with
/// [`BusError::NoNewData`]. Writes are recorded and succeed unless a failure was queued.
#[derive(Debug, Default)]
pub struct MockI2cDevice {
    reads: VecDeque<Result<Vec<u8>, BusError>>,
    write_failures: VecDeque<BusError>,
    written: Vec<Vec<u8>>,
}

impl MockI2cDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes for the next read
    pub fn push_read(&mut self, bytes: &[u8]) {
        self.reads.push_back(Ok(bytes.to_vec()));
    }

    /// Queue words, each followed by its Sensirion CRC, as one read
    pub fn push_words(&mut self, words: &[u16]) {
        let bytes = words
            .iter()
            .flat_map(|word| {
                let [hi, lo] = word.to_be_bytes();
                [hi, lo, Crc8.compute(&[hi, lo])]
            })
            .collect();
        self.reads.push_back(Ok(bytes));
    }

    /// Queue a failing read
    pub fn push_read_error(&mut self, error: BusError) {
        self.reads.push_back(Err(error));
    }

    /// Make the next write fail
    pub fn push_write_error(&mut self, error: BusError) {
        self.write_failures.push_back(error);
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.len()
    }

    /// Every successful write, oldest first
    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    pub fn take_written(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.written)
    }
}

impl I2cDevice for MockI2cDevice {
    fn read(&mut self, buf: &mut [u8]) -> Result<(), BusError> {
        let bytes = self.reads.pop_front().ok_or(BusError::NoNewData)??;
        if bytes.len() != buf.len() {
            return Err(BusError::ReadError);
        }
        buf.copy_from_slice(&bytes);
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), BusError> {
        if let Some(error) = self.write_failures.pop_front() {
            return Err(error);
        }
        self.written.push(buf.to_vec());
        Ok(())
    }
}
