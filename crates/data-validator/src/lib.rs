//! Data Validation
//!
//! Provides range checking for decoded measurements and the checksum primitives the
//! sensor protocols verify their frames with.

mod checksum;
mod error;
mod validator;

pub use checksum::{Checksum, Crc8, Sum8};
pub use error::{Quantity, ValidationError};
pub use validator::{ValidationConfig, Validator};
