//! SFDP type definitions
//!
//! Types representing the SFDP structures this driver consumes, as defined
//! by JEDEC JESD216.

use bitflags::bitflags;

use crate::spi::{opcodes, AddressWidth, BusFormat, IoMode};

/// SFDP signature as it appears on the wire
pub const SFDP_SIGNATURE: [u8; 4] = *b"SFDP";

/// Maximum number of parameter headers scanned
pub const MAX_PARAMETER_HEADERS: usize = 16;

/// Maximum Basic Flash Parameter Table length read (20 DWORDs)
pub const MAX_BASIC_TABLE_LEN: usize = 80;

/// Maximum number of sector map regions
pub const MAX_REGIONS: usize = 10;

/// Maximum Sector Map Table length read (descriptor + one DWORD per region)
pub const MAX_SECTOR_MAP_LEN: usize = 4 + 4 * MAX_REGIONS;

/// Length of the 4-byte Address Instruction Table (2 DWORDs)
pub const FOUR_BYTE_TABLE_LEN: usize = 8;

/// Length of the xSPI profile table prefix used (DWORD1..DWORD4)
pub const XSPI_TABLE_LEN: usize = 16;

// ----------------------------------------------------------------------------
// Parameter IDs (MSB << 8 | LSB)
// ----------------------------------------------------------------------------

/// Basic Flash Parameter Table ID
pub const PARAM_ID_BASIC: u16 = 0xFF00;
/// Sector Map Parameter Table ID
pub const PARAM_ID_SECTOR_MAP: u16 = 0xFF81;
/// 4-byte Address Instruction Table ID
pub const PARAM_ID_4BYTE_ADDR: u16 = 0xFF84;
/// xSPI Profile 1.0 Parameter Table ID
pub const PARAM_ID_XSPI_1_0: u16 = 0xFF05;

/// Read a little-endian DWORD (1-based index) from a table; bytes past the
/// end read as zero
pub fn dword(table: &[u8], index: usize) -> u32 {
    let offset = (index - 1) * 4;
    let mut bytes = [0u8; 4];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = table.get(offset + i).copied().unwrap_or(0);
    }
    u32::from_le_bytes(bytes)
}

/// Returns true if the table is long enough to hold DWORD `index`
pub fn has_dword(table: &[u8], index: usize) -> bool {
    table.len() >= index * 4
}

// ----------------------------------------------------------------------------
// Headers
// ----------------------------------------------------------------------------

/// SFDP revision information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SfdpRevision {
    /// Major revision number
    pub major: u8,
    /// Minor revision number
    pub minor: u8,
}

impl SfdpRevision {
    /// Create a new revision
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl core::fmt::Display for SfdpRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// SFDP header structure (first 8 bytes at address 0x00)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfdpHeader {
    /// Signature bytes, "SFDP" when valid
    pub signature: [u8; 4],
    /// SFDP revision
    pub revision: SfdpRevision,
    /// Number of parameter headers minus one
    pub nph: u8,
    /// Access protocol (0xFF for legacy)
    pub access_protocol: u8,
}

impl SfdpHeader {
    /// Parse SFDP header from raw bytes
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            signature: [data[0], data[1], data[2], data[3]],
            revision: SfdpRevision::new(data[5], data[4]),
            nph: data[6],
            access_protocol: data[7],
        }
    }

    /// Check if the signature is valid
    pub fn is_valid(&self) -> bool {
        self.signature == SFDP_SIGNATURE
    }

    /// Get the number of parameter headers
    pub fn num_param_headers(&self) -> usize {
        (self.nph as usize) + 1
    }
}

/// Parameter header structure (8 bytes each, starting at address 0x08)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterHeader {
    /// Parameter ID (MSB << 8 | LSB)
    pub id: u16,
    /// Parameter table revision
    pub revision: SfdpRevision,
    /// Parameter table length in DWORDs
    pub length_dwords: u8,
    /// Parameter table pointer (24-bit byte address)
    pub table_pointer: u32,
}

impl ParameterHeader {
    /// Parse a parameter header from raw bytes
    ///
    /// The pointer is little-endian even though addresses go out big-endian
    /// on the wire.
    pub fn parse(data: &[u8; 8]) -> Self {
        Self {
            id: u16::from_le_bytes([data[0], data[7]]),
            revision: SfdpRevision::new(data[2], data[1]),
            length_dwords: data[3],
            table_pointer: u32::from_le_bytes([data[4], data[5], data[6], 0]),
        }
    }

    /// Get the table length in bytes
    pub fn length_bytes(&self) -> usize {
        (self.length_dwords as usize) * 4
    }

    /// Location of the table this header points at
    pub fn location(&self) -> TableLocation {
        TableLocation {
            addr: self.table_pointer,
            len: self.length_bytes(),
        }
    }
}

/// Where a parameter table lives in the SFDP address space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableLocation {
    /// Byte address of the table
    pub addr: u32,
    /// Advertised length in bytes
    pub len: usize,
}

/// Parameter tables located by the header parser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfdpDescriptor {
    /// SFDP revision from the header
    pub revision: SfdpRevision,
    /// Basic Flash Parameter Table
    pub basic: TableLocation,
    /// Sector Map Table, if present
    pub sector_map: Option<TableLocation>,
    /// 4-byte Address Instruction Table, if present
    pub four_byte: Option<TableLocation>,
    /// xSPI Profile 1.0 table, if present
    pub xspi: Option<TableLocation>,
}

// ----------------------------------------------------------------------------
// Fast read parameters
// ----------------------------------------------------------------------------

/// Parameters for a fast read command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FastReadParams {
    /// Instruction opcode (0x00 if not supported)
    pub opcode: u8,
    /// Number of mode clock cycles
    pub mode_clocks: u8,
    /// Number of dummy/wait clock cycles before valid output
    pub dummy_clocks: u8,
}

impl FastReadParams {
    /// Check if this fast read mode is supported
    pub fn is_supported(&self) -> bool {
        self.opcode != 0x00
    }

    /// Layout: [31:24] instruction, [23:21] mode clocks, [20:16] dummy clocks
    pub fn from_high_half(dword: u32) -> Self {
        Self::from_low_half(dword >> 16)
    }

    /// Layout: [15:8] instruction, [7:5] mode clocks, [4:0] dummy clocks
    pub fn from_low_half(dword: u32) -> Self {
        Self {
            opcode: ((dword >> 8) & 0xFF) as u8,
            mode_clocks: ((dword >> 5) & 0x07) as u8,
            dummy_clocks: (dword & 0x1F) as u8,
        }
    }
}

// ----------------------------------------------------------------------------
// Erase types
// ----------------------------------------------------------------------------

/// One erase granularity the device supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseType {
    /// Erase instruction
    pub instruction: u8,
    /// Erase unit size in bytes
    pub size: u32,
}

impl EraseType {
    /// Parse from size exponent (N where size = 2^N) and opcode
    ///
    /// Exponent 0 and opcodes 0x00/0xFF mark an absent slot.
    pub fn from_raw(size_exp: u8, opcode: u8) -> Option<Self> {
        if size_exp == 0 || size_exp >= 32 || opcode == 0x00 || opcode == 0xFF {
            None
        } else {
            Some(Self {
                instruction: opcode,
                size: 1u32 << size_exp,
            })
        }
    }
}

bitflags! {
    /// Set of erase type slots, bit `i` standing for erase type `i + 1`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EraseTypeMask: u8 {
        /// Erase type 1
        const TYPE1 = 1 << 0;
        /// Erase type 2
        const TYPE2 = 1 << 1;
        /// Erase type 3
        const TYPE3 = 1 << 2;
        /// Erase type 4
        const TYPE4 = 1 << 3;
    }
}

impl Default for EraseTypeMask {
    fn default() -> Self {
        EraseTypeMask::empty()
    }
}

impl EraseTypeMask {
    /// Mask of the slots that hold an erase type
    pub fn present(types: &[Option<EraseType>; 4]) -> Self {
        types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .fold(Self::empty(), |mask, (i, _)| mask | Self::slot(i))
    }

    /// Mask for slot index `i` (0-based)
    pub fn slot(i: usize) -> Self {
        Self::from_bits_truncate(1u8 << i)
    }

    /// Returns true if slot index `i` is in the mask
    pub fn has_slot(&self, i: usize) -> bool {
        i < 4 && self.contains(Self::slot(i))
    }
}

// ----------------------------------------------------------------------------
// Addressing
// ----------------------------------------------------------------------------

/// Address bytes advertised in BFPT DWORD1 bits [18:17]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressBytes {
    /// 3-byte addressing only (up to 16 MiB)
    #[default]
    ThreeOnly,
    /// 3-byte default, can switch to 4-byte
    ThreeOrFour,
    /// 4-byte addressing only
    FourOnly,
}

impl AddressBytes {
    /// Parse from BFPT DWORD 1 bits [18:17]
    pub fn from_bfpt(value: u8) -> Self {
        match value & 0x03 {
            0b01 => Self::ThreeOrFour,
            0b10 => Self::FourOnly,
            // 0b11 is reserved
            _ => Self::ThreeOnly,
        }
    }
}

bitflags! {
    /// 4-byte address entry methods from BFPT DWORD16 bits [31:24]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FourByteEntryMethods: u8 {
        /// Enter with instruction B7h
        const ENTER_B7 = 0x01;
        /// Enter with WREN then B7h
        const WREN_ENTER_B7 = 0x02;
        /// 8-bit extended address register, read C8h / write C5h
        const EXT_ADDR_REG = 0x04;
        /// Bank register, read 16h / write 17h, bit 7 enables 4-byte
        const BANK_REG = 0x08;
        /// Non-volatile configuration register, read B5h / write B1h
        const NV_CONFIG_REG = 0x10;
        /// Dedicated 4-byte instruction set
        const DEDICATED = 0x20;
        /// Always operates in 4-byte mode
        const ALWAYS = 0x40;
    }
}

impl Default for FourByteEntryMethods {
    fn default() -> Self {
        FourByteEntryMethods::empty()
    }
}

/// How the device is driven past 16 MiB
///
/// Variants are listed in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FourByteEntry {
    /// Device is always in 4-byte mode
    Always,
    /// Enter with B7h
    EnterB7,
    /// Enter with WREN then B7h
    WrenEnterB7,
    /// Clear bit 0 of the non-volatile configuration register
    NvConfigRegister,
    /// Set bit 7 of the bank register
    BankRegister,
    /// Stay on 3-byte addresses and write the MSB to the extended address
    /// register before each transaction
    ExtAddrRegister,
    /// Use the dedicated 4-byte opcodes from the 4-byte instruction table
    DedicatedInstructions,
    /// Stay on 24-bit addressing
    #[default]
    Unsupported,
}

impl FourByteEntryMethods {
    /// Pick the highest-priority method
    ///
    /// `dedicated_available` tells whether a usable 4-byte instruction table
    /// was found; without one the dedicated method is skipped.
    pub fn select(&self, address_bytes: AddressBytes, dedicated_available: bool) -> FourByteEntry {
        if address_bytes == AddressBytes::FourOnly || self.contains(Self::ALWAYS) {
            FourByteEntry::Always
        } else if self.contains(Self::ENTER_B7) {
            FourByteEntry::EnterB7
        } else if self.contains(Self::WREN_ENTER_B7) {
            FourByteEntry::WrenEnterB7
        } else if self.contains(Self::NV_CONFIG_REG) {
            FourByteEntry::NvConfigRegister
        } else if self.contains(Self::BANK_REG) {
            FourByteEntry::BankRegister
        } else if self.contains(Self::EXT_ADDR_REG) {
            FourByteEntry::ExtAddrRegister
        } else if self.contains(Self::DEDICATED) && dedicated_available {
            FourByteEntry::DedicatedInstructions
        } else {
            FourByteEntry::Unsupported
        }
    }
}

// ----------------------------------------------------------------------------
// Mode enables
// ----------------------------------------------------------------------------

/// Quad Enable (QE) bit location and write method, from BFPT DWORD15 QER
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuadEnable {
    /// No QE bit
    #[default]
    None,
    /// QE is bit 1 of SR2; write SR1 and SR2 together with 01h
    Sr2Bit1WriteBoth,
    /// QE is bit 1 of SR2; write SR2 alone with 31h
    Sr2Bit1Write31,
    /// QE is bit 6 of SR1
    Sr1Bit6,
    /// QE is bit 7 of the register read with 3Fh and written with 3Eh
    Bit7Via3F,
}

impl QuadEnable {
    /// Parse from BFPT DWORD 15 bits [22:20]
    ///
    /// Returns `None` for the reserved code.
    pub fn from_qer(value: u8) -> Option<Self> {
        match value & 0x07 {
            0 => Some(Self::None),
            1 | 4 | 5 => Some(Self::Sr2Bit1WriteBoth),
            2 => Some(Self::Sr1Bit6),
            3 => Some(Self::Bit7Via3F),
            6 => Some(Self::Sr2Bit1Write31),
            _ => None,
        }
    }
}

/// Soft reset sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftResetMethod {
    /// Single F0h instruction
    Direct,
    /// Reset Enable 66h followed by Reset 99h
    EnableAndReset,
}

/// Soft reset support advertised by BFPT DWORD16 bits [13:8]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftResetSupport {
    /// The table is too short to hold DWORD16
    #[default]
    NotDescribed,
    /// DWORD16 is present but advertises neither supported sequence
    Unsupported,
    /// The sequence to use
    Method(SoftResetMethod),
}

impl SoftResetSupport {
    /// Parse from BFPT DWORD 16 bits [13:8]
    pub fn from_bfpt(value: u8) -> Self {
        if value & 0x08 != 0 {
            Self::Method(SoftResetMethod::Direct)
        } else if value & 0x10 != 0 {
            Self::Method(SoftResetMethod::EnableAndReset)
        } else {
            Self::Unsupported
        }
    }
}

/// QPI (4-4-4) enable sequence, BFPT DWORD15 bits [8:4]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QpiEnable {
    /// Issue 38h
    Inst38,
    /// Issue 35h
    Inst35,
    /// Read configuration register with 65h, set bit 6, write with 71h
    SetBit6Via71,
    /// Read configuration register with 65h, clear bit 7, write with 61h
    ClearBit7Via61,
}

impl QpiEnable {
    /// Parse from BFPT DWORD 15 bits [8:4]
    pub fn from_bfpt(value: u8) -> Option<Self> {
        match value & 0x1F {
            0b00001 | 0b00010 => Some(Self::Inst38),
            0b00100 => Some(Self::Inst35),
            0b01000 => Some(Self::SetBit6Via71),
            0b10000 => Some(Self::ClearBit7Via61),
            _ => None,
        }
    }
}

/// OPI (8-8-8) enable sequence, BFPT DWORD19 bits [8:4]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpiEnable {
    /// WREN, then E8h
    WrenE8,
    /// WREN, then 72h to address 0 with data 0x01
    WrenWrite72,
}

impl OpiEnable {
    /// Parse from BFPT DWORD 19 bits [8:4]
    pub fn from_bfpt(value: u8) -> Option<Self> {
        match value & 0x1F {
            0b00001 => Some(Self::WrenE8),
            0b00010 => Some(Self::WrenWrite72),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Read profile
// ----------------------------------------------------------------------------

/// The read command selected for the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadProfile {
    /// Bus widths of the read
    pub mode: IoMode,
    /// Read instruction
    pub instruction: u8,
    /// Mode (alt) clock cycles
    pub mode_clocks: u8,
    /// Dummy clock cycles
    pub dummy_cycles: u8,
}

impl ReadProfile {
    /// Plain 1-1-1 READ (03h) with no dummy cycles
    pub const fn legacy() -> Self {
        Self {
            mode: IoMode::Single,
            instruction: opcodes::READ,
            mode_clocks: 0,
            dummy_cycles: 0,
        }
    }

    /// Number of alt bits sent during the mode clocks
    pub fn alt_bits(&self) -> u8 {
        self.mode_clocks * self.mode.addr_width().lines()
    }

    /// Transport format for this read
    pub fn format(&self, addr_size: AddressWidth) -> BusFormat {
        BusFormat::for_mode(self.mode, addr_size, self.mode_clocks, self.dummy_cycles)
    }
}

impl Default for ReadProfile {
    fn default() -> Self {
        Self::legacy()
    }
}

// ----------------------------------------------------------------------------
// Auxiliary tables
// ----------------------------------------------------------------------------

/// 4-byte Address Instruction Table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FourByteTable {
    /// DWORD1 support bitmask
    pub support: u32,
    /// DWORD2 erase opcodes per erase type
    pub erase_opcodes: [u8; 4],
}

impl FourByteTable {
    /// 1-1-1 READ (13h) supported
    pub const READ_1_1_1: u32 = 1 << 0;
    /// 1-1-1 FAST_READ (0Ch) supported
    pub const FAST_READ_1_1_1: u32 = 1 << 1;
    /// 1-1-2 FAST_READ (3Ch) supported
    pub const FAST_READ_1_1_2: u32 = 1 << 2;
    /// 1-2-2 FAST_READ (BCh) supported
    pub const FAST_READ_1_2_2: u32 = 1 << 3;
    /// 1-1-4 FAST_READ (6Ch) supported
    pub const FAST_READ_1_1_4: u32 = 1 << 4;
    /// 1-4-4 FAST_READ (ECh) supported
    pub const FAST_READ_1_4_4: u32 = 1 << 5;
    /// 1-1-1 PAGE_PROGRAM (12h) supported
    pub const PAGE_PROGRAM_1_1_1: u32 = 1 << 6;

    /// Parse from the two table DWORDs
    pub fn from_dwords(dword1: u32, dword2: u32) -> Self {
        Self {
            support: dword1,
            erase_opcodes: dword2.to_le_bytes(),
        }
    }

    /// Check if a support bit is set
    pub fn supports(&self, flag: u32) -> bool {
        self.support & flag != 0
    }

    /// Returns true if the table can carry a dedicated 4-byte command set
    pub fn is_usable(&self) -> bool {
        self.supports(Self::READ_1_1_1) && self.supports(Self::PAGE_PROGRAM_1_1_1)
    }

    /// 4-byte equivalent of a 3-byte read opcode, if the table supports it
    pub fn read_opcode(&self, opcode: u8) -> Option<u8> {
        let (flag, mapped) = match opcode {
            opcodes::READ => (Self::READ_1_1_1, opcodes::READ_4B),
            opcodes::FAST_READ => (Self::FAST_READ_1_1_1, opcodes::FAST_READ_4B),
            opcodes::DOR => (Self::FAST_READ_1_1_2, opcodes::DOR_4B),
            opcodes::DIOR => (Self::FAST_READ_1_2_2, opcodes::DIOR_4B),
            opcodes::QOR => (Self::FAST_READ_1_1_4, opcodes::QOR_4B),
            opcodes::QIOR => (Self::FAST_READ_1_4_4, opcodes::QIOR_4B),
            _ => return None,
        };
        self.supports(flag).then_some(mapped)
    }

    /// 4-byte erase opcode for erase type slot `i` (0-based)
    pub fn erase_opcode(&self, i: usize) -> Option<u8> {
        self.erase_opcodes
            .get(i)
            .copied()
            .filter(|&op| op != 0x00 && op != 0xFF)
    }
}

/// Fields used from the xSPI Profile 1.0 table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XspiProfile {
    /// 8-8-8 read fast opcode, 0 if not described
    pub read_fast_opcode: u8,
    /// Dummy cycles for the 8-8-8 read
    pub dummy_cycles: u8,
}

// ----------------------------------------------------------------------------
// Geometry
// ----------------------------------------------------------------------------

/// Everything the Basic Flash Parameter Table tells the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryInfo {
    /// Basic table revision
    pub revision: SfdpRevision,
    /// Device size in bytes
    pub device_size: u64,
    /// Page program size in bytes
    pub page_size: u32,
    /// Address bytes advertised by DWORD1
    pub address_bytes: AddressBytes,
    /// 4-byte entry methods advertised by DWORD16
    pub four_byte_methods: FourByteEntryMethods,
    /// Erase types 1..4, `None` for absent slots
    pub erase_types: [Option<EraseType>; 4],
    /// Set when no erase type table was usable and the DWORD1 4 KiB opcode
    /// fills slot 0
    pub legacy_erase_instruction: Option<u8>,
    /// Best read profile both device and transport support
    pub read_profile: ReadProfile,
    /// Quad enable method
    pub quad_enable: QuadEnable,
    /// Soft reset support
    pub soft_reset: SoftResetSupport,
    /// QPI enable sequence, if described
    pub qpi_enable: Option<QpiEnable>,
    /// OPI enable sequence, if described
    pub opi_enable: Option<OpiEnable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_header_little_endian_pointer() {
        let raw = [0x00, 0x06, 0x01, 0x10, 0x30, 0x00, 0x00, 0xFF];
        let header = ParameterHeader::parse(&raw);
        assert_eq!(header.id, PARAM_ID_BASIC);
        assert_eq!(header.revision, SfdpRevision::new(1, 6));
        assert_eq!(header.length_bytes(), 64);
        assert_eq!(header.table_pointer, 0x30);

        let raw = [0x81, 0x00, 0x01, 0x02, 0x56, 0x34, 0x12, 0xFF];
        let header = ParameterHeader::parse(&raw);
        assert_eq!(header.id, PARAM_ID_SECTOR_MAP);
        assert_eq!(header.table_pointer, 0x0012_3456);
    }

    #[test]
    fn test_dword_reads_zero_past_end() {
        let table = [0x78, 0x56, 0x34, 0x12, 0xAA];
        assert_eq!(dword(&table, 1), 0x1234_5678);
        assert_eq!(dword(&table, 2), 0x0000_00AA);
        assert_eq!(dword(&table, 3), 0);
        assert!(has_dword(&table, 1));
        assert!(!has_dword(&table, 2));
    }

    #[test]
    fn test_erase_type_absent_slots() {
        assert_eq!(
            EraseType::from_raw(12, 0x20),
            Some(EraseType {
                instruction: 0x20,
                size: 4096
            })
        );
        assert_eq!(EraseType::from_raw(0, 0x20), None);
        assert_eq!(EraseType::from_raw(16, 0xFF), None);
        assert_eq!(EraseType::from_raw(16, 0x00), None);
    }

    #[test]
    fn test_qer_mapping() {
        assert_eq!(QuadEnable::from_qer(0), Some(QuadEnable::None));
        assert_eq!(QuadEnable::from_qer(1), Some(QuadEnable::Sr2Bit1WriteBoth));
        assert_eq!(QuadEnable::from_qer(4), Some(QuadEnable::Sr2Bit1WriteBoth));
        assert_eq!(QuadEnable::from_qer(5), Some(QuadEnable::Sr2Bit1WriteBoth));
        assert_eq!(QuadEnable::from_qer(2), Some(QuadEnable::Sr1Bit6));
        assert_eq!(QuadEnable::from_qer(3), Some(QuadEnable::Bit7Via3F));
        assert_eq!(QuadEnable::from_qer(6), Some(QuadEnable::Sr2Bit1Write31));
        assert_eq!(QuadEnable::from_qer(7), None);
    }

    #[test]
    fn test_four_byte_entry_priority() {
        let all = FourByteEntryMethods::all();
        assert_eq!(
            all.select(AddressBytes::ThreeOrFour, true),
            FourByteEntry::Always
        );

        let methods = FourByteEntryMethods::EXT_ADDR_REG | FourByteEntryMethods::BANK_REG;
        assert_eq!(
            methods.select(AddressBytes::ThreeOrFour, true),
            FourByteEntry::BankRegister
        );

        let methods = FourByteEntryMethods::DEDICATED;
        assert_eq!(
            methods.select(AddressBytes::ThreeOrFour, true),
            FourByteEntry::DedicatedInstructions
        );
        assert_eq!(
            methods.select(AddressBytes::ThreeOrFour, false),
            FourByteEntry::Unsupported
        );

        assert_eq!(
            FourByteEntryMethods::empty().select(AddressBytes::FourOnly, false),
            FourByteEntry::Always
        );
    }

    #[test]
    fn test_four_byte_table_mapping() {
        let table = FourByteTable::from_dwords(
            FourByteTable::READ_1_1_1 | FourByteTable::FAST_READ_1_4_4 | FourByteTable::PAGE_PROGRAM_1_1_1,
            0xDC5C_FF21,
        );
        assert!(table.is_usable());
        assert_eq!(table.read_opcode(0x03), Some(0x13));
        assert_eq!(table.read_opcode(0xEB), Some(0xEC));
        assert_eq!(table.read_opcode(0x6B), None);
        assert_eq!(table.erase_opcode(0), Some(0x21));
        assert_eq!(table.erase_opcode(1), None);
        assert_eq!(table.erase_opcode(3), Some(0xDC));
    }

    #[test]
    fn test_soft_reset_support() {
        assert_eq!(
            SoftResetSupport::from_bfpt(0x18),
            SoftResetSupport::Method(SoftResetMethod::Direct)
        );
        assert_eq!(
            SoftResetSupport::from_bfpt(0x10),
            SoftResetSupport::Method(SoftResetMethod::EnableAndReset)
        );
        assert_eq!(SoftResetSupport::from_bfpt(0x00), SoftResetSupport::Unsupported);
    }

    #[test]
    fn test_read_profile_alt_bits() {
        let profile = ReadProfile {
            mode: IoMode::QuadIo,
            instruction: 0xEB,
            mode_clocks: 2,
            dummy_cycles: 4,
        };
        assert_eq!(profile.alt_bits(), 8);
        assert_eq!(profile.format(AddressWidth::ThreeByte).alt_bits, 8);
        assert_eq!(ReadProfile::default().instruction, 0x03);
    }
}
