//! Protocol implementations
//!
//! This module contains the serial flash command sequences the driver is
//! built from: status polling, the write-enable handshake, SFDP access,
//! soft reset, the erase/program primitives, and the register sequences
//! that switch a device into quad, QPI/OPI, fast and 4-byte modes.

mod modes;
mod qspi;

pub use modes::*;
pub use qspi::*;
