//! Checksum primitives

use crate::error::ValidationError;
use crc::{Crc, CRC_8_NRSC_5};

/// CRC-8 with polynomial 0x31, init 0xFF, no reflection, no final XOR
const SENSIRION_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_NRSC_5);

/// An 8-bit checksum over a byte slice
pub trait Checksum {
    /// Compute the checksum of `bytes`
    fn compute(&self, bytes: &[u8]) -> u8;

    /// Check `bytes` against a received checksum
    fn verify(&self, bytes: &[u8], received: u8) -> Result<(), ValidationError> {
        let computed = self.compute(bytes);
        if computed == received {
            Ok(())
        } else {
            Err(ValidationError::Checksum { computed, received })
        }
    }
}

/// Sum of all bytes modulo 256
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum8;

impl Checksum for Sum8 {
    fn compute(&self, bytes: &[u8]) -> u8 {
        bytes.iter().fold(0u8, |acc, &x| acc.wrapping_add(x))
    }
}

/// CRC-8 used by Sensirion sensors to protect every 16-bit word
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc8;

impl Checksum for Crc8 {
    fn compute(&self, bytes: &[u8]) -> u8 {
        SENSIRION_CRC.checksum(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum8_wraps() {
        assert_eq!(Sum8.compute(&[0x01, 0x81, 0x01, 0x00]), 0x83);
        assert_eq!(Sum8.compute(&[0x01, 0x80, 0x01, 0x48]), 0xCA);
        assert_eq!(Sum8.compute(&[0xFF, 0x02]), 0x01);
        assert_eq!(Sum8.compute(&[]), 0x00);
    }

    #[test]
    fn test_sensirion_crc() {
        // Reference value from the Sensirion datasheets
        assert_eq!(Crc8.compute(&[0xBE, 0xEF]), 0x92);
        assert_eq!(Crc8.compute(&[0x00, 0x00]), 0x81);
    }

    #[test]
    fn test_verify() {
        assert!(Sum8.verify(&[0x01, 0x80, 0x01, 0x48], 0xCA).is_ok());
        assert_eq!(
            Sum8.verify(&[0x01, 0x80, 0x01, 0x48], 0xCB),
            Err(ValidationError::Checksum {
                computed: 0xCA,
                received: 0xCB
            })
        );
        assert!(Crc8.verify(&[0xBE, 0xEF], 0x92).is_ok());
        assert!(Crc8.verify(&[0xBE, 0xEF], 0x93).is_err());
    }
}
