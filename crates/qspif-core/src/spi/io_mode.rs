//! Bus widths and SFDP read modes

use crate::bus::BusFeatures;
use crate::error::BusError;

/// Number of signal lines used by one phase of a transaction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BusWidth {
    /// One line
    #[default]
    Single,
    /// Two lines
    Dual,
    /// Four lines
    Quad,
    /// Eight lines
    Octal,
}

impl BusWidth {
    /// Returns the number of lines
    pub const fn lines(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
            Self::Quad => 4,
            Self::Octal => 8,
        }
    }
}

/// Read mode, written as instruction-address-data line counts
///
/// Variants are listed in the driver's preference order, best first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum IoMode {
    /// OPI: 8-8-8
    Opi,
    /// QPI: 4-4-4
    Qpi,
    /// Quad I/O: 1-4-4
    QuadIo,
    /// Quad output: 1-1-4
    QuadOut,
    /// DPI: 2-2-2
    Dpi,
    /// Dual I/O: 1-2-2
    DualIo,
    /// Dual output: 1-1-2
    DualOut,
    /// Standard SPI: 1-1-1
    #[default]
    Single,
}

impl IoMode {
    /// All modes in strict preference order
    pub const PRIORITY: [IoMode; 8] = [
        IoMode::Opi,
        IoMode::Qpi,
        IoMode::QuadIo,
        IoMode::QuadOut,
        IoMode::Dpi,
        IoMode::DualIo,
        IoMode::DualOut,
        IoMode::Single,
    ];

    /// Width of the instruction phase
    pub const fn inst_width(&self) -> BusWidth {
        match self {
            Self::Opi => BusWidth::Octal,
            Self::Qpi => BusWidth::Quad,
            Self::Dpi => BusWidth::Dual,
            _ => BusWidth::Single,
        }
    }

    /// Width of the address (and alt) phase
    pub const fn addr_width(&self) -> BusWidth {
        match self {
            Self::Opi => BusWidth::Octal,
            Self::Qpi | Self::QuadIo => BusWidth::Quad,
            Self::Dpi | Self::DualIo => BusWidth::Dual,
            _ => BusWidth::Single,
        }
    }

    /// Width of the data phase
    pub const fn data_width(&self) -> BusWidth {
        match self {
            Self::Opi => BusWidth::Octal,
            Self::Qpi | Self::QuadIo | Self::QuadOut => BusWidth::Quad,
            Self::Dpi | Self::DualIo | Self::DualOut => BusWidth::Dual,
            Self::Single => BusWidth::Single,
        }
    }

    /// Returns true if data moves on four lines, which needs the QE bit
    pub const fn needs_quad_enable(&self) -> bool {
        matches!(self, Self::Qpi | Self::QuadIo | Self::QuadOut)
    }

    /// Transport capability needed for this mode
    pub const fn required_feature(&self) -> BusFeatures {
        match self {
            Self::Opi => BusFeatures::OPI,
            Self::Qpi => BusFeatures::QPI,
            Self::QuadIo => BusFeatures::QUAD_IO,
            Self::QuadOut => BusFeatures::QUAD_OUT,
            Self::Dpi => BusFeatures::DPI,
            Self::DualIo => BusFeatures::DUAL_IO,
            Self::DualOut => BusFeatures::DUAL_OUT,
            Self::Single => BusFeatures::empty(),
        }
    }
}

impl core::fmt::Display for IoMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.inst_width().lines(),
            self.addr_width().lines(),
            self.data_width().lines()
        )
    }
}

/// Check if a transport supports the requested I/O mode
///
/// Returns `Ok(())` if the mode is supported, or
/// `Err(FormatNotSupported)` if not.
pub fn check_io_mode_supported(mode: IoMode, features: BusFeatures) -> Result<(), BusError> {
    if features.contains(mode.required_feature()) {
        Ok(())
    } else {
        Err(BusError::FormatNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert_eq!(IoMode::PRIORITY[0], IoMode::Opi);
        assert_eq!(IoMode::PRIORITY[7], IoMode::Single);
        assert_eq!(IoMode::PRIORITY.len(), 8);
    }

    #[test]
    fn test_display() {
        use std::string::ToString;
        assert_eq!(IoMode::QuadIo.to_string(), "1-4-4");
        assert_eq!(IoMode::Opi.to_string(), "8-8-8");
        assert_eq!(IoMode::DualOut.to_string(), "1-1-2");
    }

    #[test]
    fn test_check_supported() {
        assert!(check_io_mode_supported(IoMode::Single, BusFeatures::empty()).is_ok());
        assert!(check_io_mode_supported(IoMode::QuadIo, BusFeatures::QUAD).is_ok());
        assert_eq!(
            check_io_mode_supported(IoMode::Qpi, BusFeatures::QUAD),
            Err(BusError::FormatNotSupported)
        );
    }

    #[test]
    fn test_quad_enable_needed() {
        assert!(IoMode::QuadOut.needs_quad_enable());
        assert!(IoMode::Qpi.needs_quad_enable());
        assert!(!IoMode::DualIo.needs_quad_enable());
        assert!(!IoMode::Opi.needs_quad_enable());
    }
}
