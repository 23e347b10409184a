//! Transport trait definitions

use crate::error::BusError;
use crate::spi::{BusFormat, BusWidth, SpiCommand, MAX_HEADER_LEN};
use bitflags::bitflags;

bitflags! {
    /// Transport capability flags
    ///
    /// These flags indicate which multi-line formats a transport can drive.
    /// The driver only negotiates read modes whose flag is present.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BusFeatures: u32 {
        /// Can read two bits at once (1-1-2 mode)
        const DUAL_OUT = 1 << 0;
        /// Can transfer two bits at once (1-2-2 mode)
        const DUAL_IO  = 1 << 1;
        /// Can send commands on two lines (2-2-2 mode)
        const DPI      = 1 << 2;
        /// Can read four bits at once (1-1-4 mode)
        const QUAD_OUT = 1 << 3;
        /// Can transfer four bits at once (1-4-4 mode)
        const QUAD_IO  = 1 << 4;
        /// Can send commands with quad I/O (4-4-4 mode)
        const QPI      = 1 << 5;
        /// Can send commands with octal I/O (8-8-8 mode)
        const OPI      = 1 << 6;

        /// Shorthand for dual mode (both DUAL_OUT and DUAL_IO)
        const DUAL = Self::DUAL_OUT.bits() | Self::DUAL_IO.bits();
        /// Shorthand for quad mode (both QUAD_OUT and QUAD_IO)
        const QUAD = Self::QUAD_OUT.bits() | Self::QUAD_IO.bits();
    }
}

impl Default for BusFeatures {
    fn default() -> Self {
        BusFeatures::empty()
    }
}

/// QSPI/OSPI transport
///
/// A transport holds one [`BusFormat`] at a time and applies it to every
/// transaction until reconfigured. Each call to [`execute`](Self::execute)
/// is exactly one chip-select assertion: instruction, optional address,
/// optional alt bits, dummy cycles, then the write or read data phase.
///
/// ## Example
///
/// ```ignore
/// impl QspiBus for MyController {
///     fn features(&self) -> BusFeatures {
///         BusFeatures::QUAD | BusFeatures::QPI
///     }
///
///     fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
///         self.regs.set_divider(self.clock / hz);
///         Ok(())
///     }
///
///     fn configure_format(&mut self, format: &BusFormat) -> Result<(), BusError> {
///         self.format = *format;
///         Ok(())
///     }
///
///     fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError> {
///         self.run(&self.format, cmd)
///     }
///
///     fn delay_us(&mut self, us: u32) {
///         self.timer.delay_us(us)
///     }
/// }
/// ```
pub trait QspiBus {
    /// Get the formats supported by this transport
    fn features(&self) -> BusFeatures;

    /// Set the bus clock in Hz
    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError>;

    /// Select the format used by subsequent transactions
    ///
    /// Returns `FormatNotSupported` if any phase width is beyond the
    /// transport's capabilities.
    fn configure_format(&mut self, format: &BusFormat) -> Result<(), BusError>;

    /// Execute a single transaction in the current format
    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

impl<B: QspiBus + ?Sized> QspiBus for &mut B {
    fn features(&self) -> BusFeatures {
        (**self).features()
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        (**self).set_frequency(hz)
    }

    fn configure_format(&mut self, format: &BusFormat) -> Result<(), BusError> {
        (**self).configure_format(format)
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

// Boxed transports allow trait objects to be handed to the device
#[cfg(feature = "std")]
impl QspiBus for std::boxed::Box<dyn QspiBus + Send> {
    fn features(&self) -> BusFeatures {
        (**self).features()
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        (**self).set_frequency(hz)
    }

    fn configure_format(&mut self, format: &BusFormat) -> Result<(), BusError> {
        (**self).configure_format(format)
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError> {
        (**self).execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Check that every phase of `format` fits the transport's capabilities
///
/// Protocol formats (all phases multi-line) need `QPI`/`OPI`/`DPI`; mixed
/// formats need the matching `*_IO` or `*_OUT` flag.
pub fn check_format_supported(format: &BusFormat, features: BusFeatures) -> Result<(), BusError> {
    let needed = match (format.inst_width, format.addr_width, format.data_width) {
        (BusWidth::Single, BusWidth::Single, BusWidth::Single) => BusFeatures::empty(),
        (BusWidth::Single, BusWidth::Single, BusWidth::Dual) => BusFeatures::DUAL_OUT,
        (BusWidth::Single, BusWidth::Dual, BusWidth::Dual) => BusFeatures::DUAL_IO,
        (BusWidth::Single, BusWidth::Single, BusWidth::Quad) => BusFeatures::QUAD_OUT,
        (BusWidth::Single, BusWidth::Quad, BusWidth::Quad) => BusFeatures::QUAD_IO,
        (BusWidth::Dual, BusWidth::Dual, BusWidth::Dual) => BusFeatures::DPI,
        (BusWidth::Quad, BusWidth::Quad, BusWidth::Quad) => BusFeatures::QPI,
        (BusWidth::Octal, BusWidth::Octal, BusWidth::Octal) => BusFeatures::OPI,
        _ => return Err(BusError::FormatNotSupported),
    };
    if features.contains(needed) {
        Ok(())
    } else {
        Err(BusError::FormatNotSupported)
    }
}

/// Helper function for implementing `QspiBus::execute()` on byte-oriented
/// single-line controllers.
///
/// Most simple transports follow the same pattern:
/// 1. Check the current format is plain 1-1-1
/// 2. Assemble the command header (instruction, address, alt, dummy bytes)
/// 3. Clock out the header and write data, then clock in the read data
///
/// This function handles steps 1 and 2 without allocating, delegating step
/// 3 to the provided closure.
///
/// # Example
///
/// ```ignore
/// fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError> {
///     default_execute(cmd, &self.format, |header, write_data, read_buf| {
///         self.spi.transaction(header, write_data, read_buf)
///             .map_err(|_| BusError::TransferFailed)
///     })
/// }
/// ```
pub fn default_execute<F>(
    cmd: &mut SpiCommand<'_>,
    format: &BusFormat,
    transfer_fn: F,
) -> Result<(), BusError>
where
    F: FnOnce(&[u8], &[u8], &mut [u8]) -> Result<(), BusError>,
{
    if !format.is_single_line() {
        return Err(BusError::FormatNotSupported);
    }

    let mut header = [0u8; MAX_HEADER_LEN];
    let len = cmd.encode_header(format, &mut header);
    transfer_fn(&header[..len], cmd.write_data, cmd.read_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::{AddressWidth, IoMode};

    #[test]
    fn test_check_format_supported() {
        let single = BusFormat::single(AddressWidth::ThreeByte);
        assert!(check_format_supported(&single, BusFeatures::empty()).is_ok());

        let quad_io = BusFormat::for_mode(IoMode::QuadIo, AddressWidth::ThreeByte, 2, 4);
        assert!(check_format_supported(&quad_io, BusFeatures::QUAD).is_ok());
        assert_eq!(
            check_format_supported(&quad_io, BusFeatures::DUAL),
            Err(BusError::FormatNotSupported)
        );

        let qpi = BusFormat::protocol(BusWidth::Quad, AddressWidth::ThreeByte);
        assert!(check_format_supported(&qpi, BusFeatures::QPI).is_ok());
        assert!(check_format_supported(&qpi, BusFeatures::QUAD).is_err());
    }

    #[test]
    fn test_default_execute_splits_phases() {
        let mut buf = [0u8; 2];
        let mut cmd = SpiCommand::read(0x03, 0x000100, &mut buf);
        let format = BusFormat::single(AddressWidth::ThreeByte);

        default_execute(&mut cmd, &format, |header, write_data, read_buf| {
            assert_eq!(header, &[0x03, 0x00, 0x01, 0x00]);
            assert!(write_data.is_empty());
            read_buf.copy_from_slice(&[0xDE, 0xAD]);
            Ok(())
        })
        .unwrap();
        assert_eq!(buf, [0xDE, 0xAD]);
    }

    #[test]
    fn test_default_execute_rejects_multi_line() {
        let mut cmd = SpiCommand::simple(0x06);
        let format = BusFormat::protocol(BusWidth::Quad, AddressWidth::ThreeByte);
        let result = default_execute(&mut cmd, &format, |_, _, _| Ok(()));
        assert_eq!(result, Err(BusError::FormatNotSupported));
    }
}
