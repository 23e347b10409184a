//! Bus-mode and addressing negotiation
//!
//! Combines what SFDP advertises, what the vendor quirks allow and what the
//! configuration asks for into the command set the device will be driven
//! with. This is pure; the hardware steps that go with the result live in
//! [`crate::protocol`].

use crate::quirks::VendorQuirks;
use crate::sfdp::{AddressBytes, FourByteEntry, FourByteTable, GeometryInfo, ReadProfile};
use crate::spi::{opcodes, AddressWidth, BusFormat, BusWidth, IoMode};

/// Largest device reachable with 24-bit addresses
pub const THREE_BYTE_LIMIT: u64 = 1 << 24;

/// Negotiated command set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// How addresses above 16 MiB are reached
    pub addressing: FourByteEntry,
    /// Address bytes sent on the wire
    pub addr_size: AddressWidth,
    /// Bytes the driver can reach
    pub device_size: u64,
    /// Read command
    pub read: ReadProfile,
    /// Page program instruction
    pub program_inst: u8,
    /// Erase instruction per erase type slot (0 for absent slots)
    pub erase_insts: [u8; 4],
    /// Extended address register write, when addresses carry their MSB
    /// through it
    pub ext_addr_write_inst: Option<u8>,
    /// Page size in bytes
    pub page_size: u32,
}

impl Negotiated {
    /// Whether the QE bit has to be set for the read profile
    pub fn needs_quad_enable(&self) -> bool {
        self.read.mode.needs_quad_enable()
    }

    /// Transport format used around reads
    pub fn read_format(&self) -> BusFormat {
        self.read.format(self.addr_size)
    }

    /// Transport format for everything but reads
    ///
    /// Once the device is in QPI or OPI every phase uses the protocol width.
    pub fn default_format(&self, protocol: Option<BusWidth>) -> BusFormat {
        match protocol {
            Some(width) => BusFormat::protocol(width, self.addr_size),
            None => BusFormat::single(self.addr_size),
        }
    }

    /// Protocol width the device has to be switched into, if any
    pub fn protocol_width(&self) -> Option<BusWidth> {
        match self.read.mode {
            IoMode::Qpi => Some(BusWidth::Quad),
            IoMode::Opi => Some(BusWidth::Octal),
            _ => None,
        }
    }
}

/// Resolve addressing and the command set
///
/// `enable_fast_read` false keeps the plain 03h read regardless of SFDP.
pub fn negotiate(
    geometry: &GeometryInfo,
    four_byte: Option<&FourByteTable>,
    quirks: &VendorQuirks,
    enable_fast_read: bool,
) -> Negotiated {
    let read = if enable_fast_read {
        geometry.read_profile
    } else {
        ReadProfile::legacy()
    };

    let mut erase_insts = [0u8; 4];
    for (inst, erase) in erase_insts.iter_mut().zip(geometry.erase_types.iter()) {
        if let Some(erase) = erase {
            *inst = erase.instruction;
        }
    }

    let mut negotiated = Negotiated {
        addressing: FourByteEntry::Unsupported,
        addr_size: AddressWidth::ThreeByte,
        device_size: geometry.device_size,
        read,
        program_inst: opcodes::PP,
        erase_insts,
        ext_addr_write_inst: None,
        page_size: geometry.page_size,
    };

    let four_only = geometry.address_bytes == AddressBytes::FourOnly;
    if geometry.device_size <= THREE_BYTE_LIMIT && !four_only {
        return negotiated;
    }

    let addressing = if quirks.four_byte_addressing || four_only {
        let dedicated = four_byte.is_some_and(|table| dedicated_usable(table, geometry));
        geometry
            .four_byte_methods
            .select(geometry.address_bytes, dedicated)
    } else {
        log::debug!("{}: 4-byte addressing not attempted", quirks.name);
        FourByteEntry::Unsupported
    };
    log::debug!("4-byte addressing method: {:?}", addressing);
    negotiated.addressing = addressing;

    match addressing {
        FourByteEntry::Unsupported => {
            log::warn!(
                "device is {} bytes but only 24-bit addressing is available, capping at 16 MiB",
                geometry.device_size
            );
            negotiated.device_size = THREE_BYTE_LIMIT;
        }
        FourByteEntry::ExtAddrRegister => {
            negotiated.ext_addr_write_inst = Some(opcodes::WREAR);
        }
        FourByteEntry::DedicatedInstructions => {
            negotiated.addr_size = AddressWidth::FourByte;
            if let Some(table) = four_byte {
                apply_dedicated(&mut negotiated, table);
            }
        }
        _ => negotiated.addr_size = AddressWidth::FourByte,
    }

    negotiated
}

/// The dedicated set must cover 1-1-1 read, page program and every erase type
fn dedicated_usable(table: &FourByteTable, geometry: &GeometryInfo) -> bool {
    table.is_usable()
        && geometry
            .erase_types
            .iter()
            .enumerate()
            .all(|(i, erase)| erase.is_none() || table.erase_opcode(i).is_some())
}

fn apply_dedicated(negotiated: &mut Negotiated, table: &FourByteTable) {
    match table.read_opcode(negotiated.read.instruction) {
        Some(inst) => negotiated.read.instruction = inst,
        None => {
            log::debug!(
                "no 4-byte variant of read 0x{:02X}, falling back to 0x{:02X}",
                negotiated.read.instruction,
                opcodes::READ_4B
            );
            negotiated.read = ReadProfile {
                instruction: opcodes::READ_4B,
                ..ReadProfile::legacy()
            };
        }
    }
    negotiated.program_inst = opcodes::PP_4B;
    for (i, inst) in negotiated.erase_insts.iter_mut().enumerate() {
        if let Some(op) = table.erase_opcode(i) {
            *inst = op;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quirks;
    use crate::sfdp::{EraseType, FourByteEntryMethods};

    fn geometry(size: u64) -> GeometryInfo {
        GeometryInfo {
            device_size: size,
            page_size: 256,
            address_bytes: AddressBytes::ThreeOrFour,
            erase_types: [
                Some(EraseType { instruction: 0x20, size: 4096 }),
                None,
                Some(EraseType { instruction: 0xD8, size: 65536 }),
                None,
            ],
            read_profile: ReadProfile {
                mode: IoMode::QuadIo,
                instruction: 0xEB,
                mode_clocks: 2,
                dummy_cycles: 4,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_small_device_stays_three_byte() {
        let mut g = geometry(16 << 20);
        g.four_byte_methods = FourByteEntryMethods::ENTER_B7;
        let n = negotiate(&g, None, &VendorQuirks::DEFAULT, true);
        assert_eq!(n.addr_size, AddressWidth::ThreeByte);
        assert_eq!(n.addressing, FourByteEntry::Unsupported);
        assert_eq!(n.device_size, 16 << 20);
        assert_eq!(n.erase_insts, [0x20, 0, 0xD8, 0]);
        assert!(n.needs_quad_enable());
    }

    #[test]
    fn test_enter_b7() {
        let mut g = geometry(32 << 20);
        g.four_byte_methods = FourByteEntryMethods::ENTER_B7 | FourByteEntryMethods::EXT_ADDR_REG;
        let n = negotiate(&g, None, &VendorQuirks::DEFAULT, true);
        assert_eq!(n.addressing, FourByteEntry::EnterB7);
        assert_eq!(n.addr_size, AddressWidth::FourByte);
        assert_eq!(n.read_format().addr_size, AddressWidth::FourByte);
        assert_eq!(n.ext_addr_write_inst, None);
    }

    #[test]
    fn test_ext_addr_register() {
        let mut g = geometry(32 << 20);
        g.four_byte_methods = FourByteEntryMethods::EXT_ADDR_REG;
        let n = negotiate(&g, None, &VendorQuirks::DEFAULT, true);
        assert_eq!(n.addr_size, AddressWidth::ThreeByte);
        assert_eq!(n.ext_addr_write_inst, Some(0xC5));
        assert_eq!(n.device_size, 32 << 20);
    }

    #[test]
    fn test_dedicated_instruction_set() {
        let mut g = geometry(64 << 20);
        g.four_byte_methods = FourByteEntryMethods::DEDICATED;
        let table = FourByteTable::from_dwords(
            FourByteTable::READ_1_1_1 | FourByteTable::FAST_READ_1_4_4 | FourByteTable::PAGE_PROGRAM_1_1_1,
            0x00DC_0021,
        );
        let n = negotiate(&g, Some(&table), &VendorQuirks::DEFAULT, true);
        assert_eq!(n.addressing, FourByteEntry::DedicatedInstructions);
        assert_eq!(n.read.instruction, 0xEC);
        assert_eq!(n.program_inst, 0x12);
        assert_eq!(n.erase_insts, [0x21, 0, 0xDC, 0]);

        // Missing 4-byte opcode for erase type 3
        let partial = FourByteTable::from_dwords(table.support, 0x0000_0021);
        let n = negotiate(&g, Some(&partial), &VendorQuirks::DEFAULT, true);
        assert_eq!(n.addressing, FourByteEntry::Unsupported);
        assert_eq!(n.device_size, THREE_BYTE_LIMIT);
    }

    #[test]
    fn test_macronix_capped() {
        let mut g = geometry(32 << 20);
        g.four_byte_methods = FourByteEntryMethods::ENTER_B7;
        let n = negotiate(&g, None, quirks::lookup(0xC2), true);
        assert_eq!(n.addressing, FourByteEntry::Unsupported);
        assert_eq!(n.addr_size, AddressWidth::ThreeByte);
        assert_eq!(n.device_size, THREE_BYTE_LIMIT);

        g.address_bytes = AddressBytes::FourOnly;
        let n = negotiate(&g, None, quirks::lookup(0xC2), true);
        assert_eq!(n.addressing, FourByteEntry::Always);
        assert_eq!(n.device_size, 32 << 20);
    }

    #[test]
    fn test_fast_read_disabled() {
        let g = geometry(16 << 20);
        let n = negotiate(&g, None, &VendorQuirks::DEFAULT, false);
        assert_eq!(n.read, ReadProfile::legacy());
        assert!(!n.needs_quad_enable());
        assert!(n.read_format().is_single_line());
    }

    #[test]
    fn test_protocol_default_format() {
        let mut g = geometry(16 << 20);
        g.read_profile.mode = IoMode::Qpi;
        let n = negotiate(&g, None, &VendorQuirks::DEFAULT, true);
        assert_eq!(n.protocol_width(), Some(BusWidth::Quad));
        let format = n.default_format(n.protocol_width());
        assert_eq!(format.inst_width, BusWidth::Quad);
        assert_eq!(format.data_width, BusWidth::Quad);
        assert!(n.default_format(None).is_single_line());
    }
}
