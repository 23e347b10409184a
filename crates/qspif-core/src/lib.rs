//! qspif-core - SFDP-driven block device driver for QSPI/OSPI serial flash
//!
//! This crate discovers a flash chip's geometry at run time from its JEDEC
//! SFDP descriptor and exposes byte-addressable read, program and erase
//! operations over that geometry. The electrical side of the bus is left to
//! an external transport implementing [`bus::QspiBus`].
//!
//! The parsing, negotiation and planning layers are `no_std`. The `std`
//! feature (enabled by default) adds the mutex-guarded [`device`], the
//! process-wide chip-select registry and TOML [`config`] loading.
//!
//! # Example
//!
//! ```ignore
//! use qspif_core::device::{ChipSelect, QspifBlockDevice};
//! use qspif_core::{BlockDevice, DeviceConfig};
//!
//! fn dump_first_sector<B: qspif_core::bus::QspiBus>(bus: B) -> qspif_core::Result<()> {
//!     let flash = QspifBlockDevice::new(bus, ChipSelect(0), DeviceConfig::default())?;
//!     flash.init()?;
//!     let mut buf = [0u8; 256];
//!     flash.read(&mut buf, 0)?;
//!     println!("{} bytes, erase unit {}", flash.size(), flash.erase_size());
//!     flash.deinit()
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod block_device;
pub mod bus;
#[cfg(feature = "std")]
pub mod config;
#[cfg(feature = "std")]
pub mod device;
pub mod erase;
pub mod error;
pub mod negotiate;
pub mod protocol;
pub mod quirks;
pub mod sfdp;
pub mod spi;

pub use block_device::BlockDevice;
#[cfg(feature = "std")]
pub use config::DeviceConfig;
pub use error::{BusError, Error, Result, SfdpError};
