//! qspif-sim - In-memory serial flash emulator for testing
//!
//! [`SimFlash`] implements [`QspiBus`](qspif_core::bus::QspiBus) over an
//! emulated NOR array. It serves an SFDP image rendered by [`SfdpBuilder`]
//! and enforces the rules a real chip imposes: write enable before every
//! program and erase, no commands while busy, page wrap on long programs,
//! region-restricted erase types, QE before quad transfers and the address
//! width of the current addressing mode. Broken rules are recorded as
//! [`Violation`]s so tests can assert the driver never commits one.

mod flash;
mod sfdp;

pub use flash::{SimConfig, SimFlash, SimOp, Violation};
pub use sfdp::{EraseSpec, OpiSpec, ReadSpec, SfdpBuilder};
