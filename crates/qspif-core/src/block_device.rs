//! Block device abstraction
//!
//! The contract higher layers (filesystems, key-value stores) program
//! against. Methods take `&self`: implementations serialize access
//! internally so a device can be shared between threads.

use crate::error::Result;

/// Byte value an erased flash cell reads back as
pub const ERASE_VALUE: u8 = 0xFF;

/// A byte-addressable block device with erase units
pub trait BlockDevice {
    /// Bring the device up (ref-counted)
    fn init(&self) -> Result<()>;

    /// Drop one reference; the last one shuts the device down
    fn deinit(&self) -> Result<()>;

    /// Read `buf.len()` bytes starting at `addr`
    fn read(&self, buf: &mut [u8], addr: u64) -> Result<()>;

    /// Program `data` at `addr`; the range must have been erased
    fn program(&self, data: &[u8], addr: u64) -> Result<()>;

    /// Erase `[addr, addr + size)`
    ///
    /// Both ends must fall on an erase boundary valid at that position.
    fn erase(&self, addr: u64, size: u64) -> Result<()>;

    /// Minimum read granularity in bytes
    fn read_size(&self) -> u32 {
        1
    }

    /// Minimum program granularity in bytes
    fn program_size(&self) -> u32 {
        1
    }

    /// Smallest erase unit common to every region
    fn erase_size(&self) -> u32;

    /// Smallest erase unit available in the region containing `addr`
    fn erase_size_at(&self, addr: u64) -> u32;

    /// Device size in bytes
    fn size(&self) -> u64;

    /// Value erased bytes read back as
    fn erase_value(&self) -> u8 {
        ERASE_VALUE
    }

    /// Short device type name
    fn device_type(&self) -> &'static str;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &T {
    fn init(&self) -> Result<()> {
        (**self).init()
    }

    fn deinit(&self) -> Result<()> {
        (**self).deinit()
    }

    fn read(&self, buf: &mut [u8], addr: u64) -> Result<()> {
        (**self).read(buf, addr)
    }

    fn program(&self, data: &[u8], addr: u64) -> Result<()> {
        (**self).program(data, addr)
    }

    fn erase(&self, addr: u64, size: u64) -> Result<()> {
        (**self).erase(addr, size)
    }

    fn read_size(&self) -> u32 {
        (**self).read_size()
    }

    fn program_size(&self) -> u32 {
        (**self).program_size()
    }

    fn erase_size(&self) -> u32 {
        (**self).erase_size()
    }

    fn erase_size_at(&self, addr: u64) -> u32 {
        (**self).erase_size_at(addr)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }

    fn erase_value(&self) -> u8 {
        (**self).erase_value()
    }

    fn device_type(&self) -> &'static str {
        (**self).device_type()
    }
}
