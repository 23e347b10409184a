//! Error types for qspif-core
//!
//! [`Error`] is what a block-device consumer sees: one variant per coarse
//! failure kind. Parsing and transport failures carry more detail in
//! [`SfdpError`] and [`BusError`] and collapse into exactly one coarse kind
//! when they cross into the public API.

/// Coarse error kinds reported by the block device
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Bus/transport failure, or an operation on an uninitialized device
    #[error("device error")]
    DeviceError,
    /// SFDP signature/version mismatch or malformed parameter table
    #[error("SFDP parsing failed")]
    ParsingFailed,
    /// Ready poll exceeded its retry cap
    #[error("device not ready")]
    ReadyFailed,
    /// Write-enable latch never observed set
    #[error("write enable failed")]
    WrenFailed,
    /// Misaligned or out-of-bounds erase request
    #[error("invalid erase parameters")]
    InvalidEraseParams,
    /// Chip select already bound to another live device
    #[error("chip select already in use by another device")]
    DeviceNotUnique,
    /// Too many live devices in the chip-select registry
    #[error("maximum number of active devices exceeded")]
    DeviceMaxExceeded,
}

/// Detailed SFDP parsing failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SfdpError {
    /// The first four bytes are not "SFDP"
    #[error("SFDP signature mismatch (found {0:02X?})")]
    BadSignature([u8; 4]),
    /// Major revision other than 1
    #[error("unsupported SFDP revision {major}.{minor}")]
    UnsupportedRevision {
        /// Major revision
        major: u8,
        /// Minor revision
        minor: u8,
    },
    /// Parameter header 0 does not describe the basic parameter table
    #[error("parameter header 0 is not the basic flash parameter table (id 0x{0:04X})")]
    MissingBasicTable(u16),
    /// A parameter table is shorter than its mandatory part
    #[error("{table} table too short ({len} bytes)")]
    TableTooShort {
        /// Table name
        table: &'static str,
        /// Length in bytes
        len: usize,
    },
    /// Density field decodes to zero bytes
    #[error("device density is zero")]
    ZeroDensity,
    /// Neither an erase type table nor a legacy 4 KiB erase opcode is present
    #[error("no erase instruction available")]
    NoEraseInstruction,
    /// The sector map table cannot be used
    #[error("unsupported sector map: {0}")]
    SectorMap(&'static str),
    /// SFDP advertises no soft reset sequence this driver can issue
    #[error("no supported soft reset sequence")]
    NoSoftReset,
}

/// Transport failure reported by a [`QspiBus`](crate::bus::QspiBus) implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The transfer did not complete
    #[error("bus transfer failed")]
    TransferFailed,
    /// The requested bus width or format is not supported
    #[error("bus format not supported by the transport")]
    FormatNotSupported,
    /// The command is malformed for this transport
    #[error("invalid command for transport")]
    InvalidCommand,
    /// Frequency cannot be configured
    #[error("unsupported bus frequency {0} Hz")]
    Frequency(u32),
}

impl From<SfdpError> for Error {
    fn from(_: SfdpError) -> Self {
        Error::ParsingFailed
    }
}

impl From<BusError> for Error {
    fn from(_: BusError) -> Self {
        Error::DeviceError
    }
}

/// Result type alias using the coarse [`Error`]
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_collapses_to_one_kind() {
        assert_eq!(Error::from(SfdpError::ZeroDensity), Error::ParsingFailed);
        assert_eq!(
            Error::from(SfdpError::BadSignature(*b"SFDQ")),
            Error::ParsingFailed
        );
        assert_eq!(Error::from(BusError::TransferFailed), Error::DeviceError);
        assert_eq!(Error::from(BusError::Frequency(1)), Error::DeviceError);
    }
}
