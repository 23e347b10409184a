//! SFDP (Serial Flash Discoverable Parameters) parsing
//!
//! This module implements the parts of JEDEC JESD216 the driver needs to
//! bring a chip up without a device database.
//!
//! # Overview
//!
//! SFDP data is stored in a reserved area of the flash chip and can be
//! read using the RDSFDP command (0x5A). The structure contains:
//!
//! - An SFDP header with signature and revision info
//! - One or more parameter headers describing available tables
//! - Parameter tables containing capability information
//!
//! [`parse_headers`] locates the tables, [`parse_basic_table`] and
//! [`parse_sector_map`] interpret them, and [`discover`] runs the whole
//! chain against any SFDP reader.
//!
//! # Usage
//!
//! ```ignore
//! use qspif_core::bus::BusFeatures;
//! use qspif_core::sfdp;
//!
//! let found = sfdp::discover(|addr, buf| read_sfdp(addr, buf), BusFeatures::QUAD)?;
//! println!("Flash size: {} bytes", found.geometry.device_size);
//! println!("Regions: {}", found.regions.regions().len());
//! ```

mod basic;
mod parser;
mod sector_map;
mod types;

pub use basic::parse_basic_table;
pub use parser::*;
pub use sector_map::{parse_sector_map, Region, RegionTable};
pub use types::*;
