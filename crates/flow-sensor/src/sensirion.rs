//! Sensirion I2C Conventions
//!
//! Commands are 16-bit big-endian words. Every 16-bit word the device sends, and every
//! argument word sent to it, is followed by a CRC-8 of that word.

use crate::error::BusError;
use crate::i2c::I2cDevice;
use data_validator::{Checksum, Crc8, ValidationError};

/// Bytes per CRC-protected word
const WORD_LEN: usize = 3;
/// Longest read any command needs
const MAX_WORDS: usize = 3;

/// Sensirion command/word layer over an [`I2cDevice`]
#[derive(Debug)]
pub struct SensirionDevice<D> {
    dev: D,
    crc: Crc8,
}

impl<D: I2cDevice> SensirionDevice<D> {
    pub fn new(dev: D) -> Self {
        Self { dev, crc: Crc8 }
    }

    /// Send a bare command
    pub fn write_command(&mut self, command: u16) -> Result<(), BusError> {
        self.dev.write(&command.to_be_bytes())
    }

    /// Send a command with one CRC-protected argument word
    pub fn write_command_with_arg(&mut self, command: u16, arg: u16) -> Result<(), BusError> {
        let [c0, c1] = command.to_be_bytes();
        let [a0, a1] = arg.to_be_bytes();
        let crc = self.crc.compute(&[a0, a1]);
        self.dev.write(&[c0, c1, a0, a1, crc])
    }

    /// Read `W` words in one transfer, checking each word's CRC
    pub fn read_words<const W: usize>(&mut self) -> Result<[u16; W], BusError> {
        if W == 0 || W > MAX_WORDS {
            return Err(BusError::InvalidArguments);
        }
        let mut raw = [0u8; WORD_LEN * MAX_WORDS];
        let raw = &mut raw[..WORD_LEN * W];
        self.dev.read(raw)?;

        let mut words = [0u16; W];
        for (word, chunk) in words.iter_mut().zip(raw.chunks_exact(WORD_LEN)) {
            if let Err(ValidationError::Checksum { computed, received }) =
                self.crc.verify(&chunk[..2], chunk[2])
            {
                return Err(BusError::CrcMismatch {
                    expected: computed,
                    actual: received,
                });
            }
            *word = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        Ok(words)
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.dev
    }
}
