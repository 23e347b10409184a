//! Serial flash opcodes used by the driver
//!
//! Opcodes that SFDP reports per device (read, erase, 4-byte variants) are
//! only defaults here; the negotiated values live in the device state.

// ----------------------------------------------------------------------------
// Write control
// ----------------------------------------------------------------------------

/// Write Enable - sets WEL, required before any program/erase/register write
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL
pub const WRDI: u8 = 0x04;

// ----------------------------------------------------------------------------
// Status and configuration registers
// ----------------------------------------------------------------------------

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2 (also Winbond "enter QPI" on some parts)
pub const RDSR2: u8 = 0x35;
/// Read Configuration Register (Macronix)
pub const RDCR: u8 = 0x15;
/// Write Status Register (one byte per register, starting at SR1)
pub const WRSR: u8 = 0x01;
/// Write Status Register 2 as a separate command
pub const WRSR2: u8 = 0x31;
/// Read Status Register 2 variant holding QE at bit 7
pub const RDSR2_3F: u8 = 0x3F;
/// Write Status Register 2 variant holding QE at bit 7
pub const WRSR2_3E: u8 = 0x3E;
/// Read Configuration Register 2 (QPI/OPI enable on some parts)
pub const RDCR2: u8 = 0x65;
/// Write Configuration Register 2 via volatile write (8-bit address variant)
pub const WRCR2_71: u8 = 0x71;
/// Write Configuration Register 2 (16-bit address variant)
pub const WRCR2_61: u8 = 0x61;
/// Write Configuration Register 2 at an address (OPI enable)
pub const WRCR2_72: u8 = 0x72;

/// Global Block Protection Unlock (SST)
pub const ULBPR: u8 = 0x98;

// ----------------------------------------------------------------------------
// Identification and discovery
// ----------------------------------------------------------------------------

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;
/// Read SFDP (JEDEC JESD216), always 1-1-1 with 3-byte address and 8 dummies
pub const RDSFDP: u8 = 0x5A;
/// Dummy cycles used by RDSFDP
pub const RDSFDP_DUMMY_CYCLES: u8 = 8;

// ----------------------------------------------------------------------------
// Read and program
// ----------------------------------------------------------------------------

/// Read Data, no dummy cycles
pub const READ: u8 = 0x03;
/// Read Data with 4-byte address
pub const READ_4B: u8 = 0x13;
/// Fast Read
pub const FAST_READ: u8 = 0x0B;
/// Fast Read with 4-byte address
pub const FAST_READ_4B: u8 = 0x0C;
/// Dual Output Read (1-1-2)
pub const DOR: u8 = 0x3B;
/// Dual Output Read with 4-byte address
pub const DOR_4B: u8 = 0x3C;
/// Dual I/O Read (1-2-2)
pub const DIOR: u8 = 0xBB;
/// Dual I/O Read with 4-byte address
pub const DIOR_4B: u8 = 0xBC;
/// Quad Output Read (1-1-4)
pub const QOR: u8 = 0x6B;
/// Quad Output Read with 4-byte address
pub const QOR_4B: u8 = 0x6C;
/// Quad I/O Read (1-4-4)
pub const QIOR: u8 = 0xEB;
/// Quad I/O Read with 4-byte address
pub const QIOR_4B: u8 = 0xEC;

/// Page Program with 3-byte address
pub const PP: u8 = 0x02;
/// Page Program with 4-byte address
pub const PP_4B: u8 = 0x12;

// ----------------------------------------------------------------------------
// Erase
// ----------------------------------------------------------------------------

/// Sector Erase 4KB, used when SFDP has no erase type table
pub const SE_20: u8 = 0x20;

// ----------------------------------------------------------------------------
// 4-byte address mode control
// ----------------------------------------------------------------------------

/// Enter 4-Byte Address Mode
pub const EN4B: u8 = 0xB7;
/// Read Extended Address Register
pub const RDEAR: u8 = 0xC8;
/// Write Extended Address Register
pub const WREAR: u8 = 0xC5;
/// Read Bank Register
pub const BRRD: u8 = 0x16;
/// Write Bank Register
pub const BRWR: u8 = 0x17;
/// Read Nonvolatile Configuration Register
pub const RDNVCR: u8 = 0xB5;
/// Write Nonvolatile Configuration Register
pub const WRNVCR: u8 = 0xB1;

// ----------------------------------------------------------------------------
// Protocol mode and reset
// ----------------------------------------------------------------------------

/// Enter QPI mode
pub const EQIO: u8 = 0x38;
/// Enter QPI mode (alternate, shares its opcode with RDSR2)
pub const EQIO_35: u8 = 0x35;
/// Enter OPI mode
pub const EOPI: u8 = 0xE8;
/// Single-command soft reset
pub const SOFT_RESET: u8 = 0xF0;
/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device
pub const RST: u8 = 0x99;

// ----------------------------------------------------------------------------
// Status register bits
// ----------------------------------------------------------------------------

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;

/// Default Page Program size when SFDP leaves it unset
pub const DEFAULT_PAGE_SIZE: u32 = 256;
