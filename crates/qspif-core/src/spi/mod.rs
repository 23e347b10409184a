//! SPI command model
//!
//! This module provides the types describing a single flash transaction:
//! the bus format (widths, address size, alt and dummy phases), the command
//! itself, the read modes SFDP can advertise, and the JEDEC opcodes used by
//! the driver.

mod address;
mod command;
mod io_mode;
pub mod opcodes;

pub use address::AddressWidth;
pub use command::{BusFormat, SpiCommand, MAX_HEADER_LEN};
pub use io_mode::{check_io_mode_supported, BusWidth, IoMode};
