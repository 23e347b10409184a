//! Vendor quirks
//!
//! A small table keyed on the JEDEC manufacturer byte. The descriptor is
//! resolved once during init and consulted by the init sequence instead of
//! branching on raw IDs.

use crate::spi::opcodes;

/// How factory block protection is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockProtection {
    /// Clear the protection bits of status register 1
    StatusRegister,
    /// WREN followed by the global unlock instruction (98h)
    GlobalUnlock,
}

/// A configuration bit that must be set for full-speed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastMode {
    /// Status/config register index, 0 being SR1
    pub register: usize,
    /// Bit to set
    pub mask: u8,
}

/// Per-vendor behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorQuirks {
    /// Vendor name for logging
    pub name: &'static str,
    /// JEDEC manufacturer byte, `None` for the default entry
    pub manufacturer_id: Option<u8>,
    /// Number of status/config registers written together with 01h
    pub status_registers: usize,
    /// Instruction reading the registers after SR1
    pub status_read_inst: u8,
    /// Block protection clearing method
    pub block_protection: BlockProtection,
    /// Fast mode bit, if the part has one
    pub fast_mode: Option<FastMode>,
    /// Whether 4-byte addressing may be enabled
    pub four_byte_addressing: bool,
}

impl VendorQuirks {
    /// Descriptor for vendors without an entry
    pub const DEFAULT: VendorQuirks = VendorQuirks {
        name: "generic",
        manufacturer_id: None,
        status_registers: 2,
        status_read_inst: opcodes::RDSR2,
        block_protection: BlockProtection::StatusRegister,
        fast_mode: None,
        four_byte_addressing: true,
    };
}

impl Default for VendorQuirks {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Known vendors
pub static QUIRKS: &[VendorQuirks] = &[
    VendorQuirks {
        name: "SST/Microchip",
        manufacturer_id: Some(0xBF),
        block_protection: BlockProtection::GlobalUnlock,
        ..VendorQuirks::DEFAULT
    },
    VendorQuirks {
        name: "Macronix",
        manufacturer_id: Some(0xC2),
        status_registers: 3,
        status_read_inst: opcodes::RDCR,
        fast_mode: Some(FastMode {
            register: 2,
            mask: 0x02,
        }),
        four_byte_addressing: false,
        ..VendorQuirks::DEFAULT
    },
    VendorQuirks {
        name: "ISSI",
        manufacturer_id: Some(0x9D),
        status_registers: 1,
        ..VendorQuirks::DEFAULT
    },
];

/// Look up the quirks for a manufacturer byte
pub fn lookup(manufacturer_id: u8) -> &'static VendorQuirks {
    QUIRKS
        .iter()
        .find(|q| q.manufacturer_id == Some(manufacturer_id))
        .unwrap_or(&VendorQuirks::DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(0xBF).block_protection, BlockProtection::GlobalUnlock);

        let macronix = lookup(0xC2);
        assert_eq!(macronix.status_registers, 3);
        assert_eq!(macronix.status_read_inst, 0x15);
        assert!(!macronix.four_byte_addressing);
        assert_eq!(macronix.fast_mode, Some(FastMode { register: 2, mask: 0x02 }));

        assert_eq!(lookup(0x9D).status_registers, 1);
        assert_eq!(lookup(0xEF), &VendorQuirks::DEFAULT);
    }

    #[test]
    fn test_ids_unique() {
        for (i, a) in QUIRKS.iter().enumerate() {
            for b in &QUIRKS[i + 1..] {
                assert_ne!(a.manufacturer_id, b.manufacturer_id);
            }
        }
    }
}
