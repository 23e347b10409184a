//! Basic Flash Parameter Table interpretation

use crate::bus::BusFeatures;
use crate::error::SfdpError;
use crate::spi::{opcodes, IoMode};

use super::types::*;

/// Largest density this driver can address (32-bit addressing)
const MAX_DENSITY_BYTES: u64 = 1 << 32;

/// Interpret the Basic Flash Parameter Table
///
/// `table` holds the bytes read from the device (at most 20 DWORDs); DWORDs
/// past its end read as zero. `xspi` carries the 8-8-8 read parameters when
/// the xSPI profile table exists. Only read modes the transport lists in
/// `supported` are eligible for the read profile.
pub fn parse_basic_table(
    table: &[u8],
    xspi: Option<&XspiProfile>,
    supported: BusFeatures,
) -> Result<GeometryInfo, SfdpError> {
    if !has_dword(table, 2) {
        return Err(SfdpError::TableTooShort {
            table: "basic",
            len: table.len(),
        });
    }

    let dword1 = dword(table, 1);
    let device_size = parse_density(dword(table, 2))?;
    log::debug!("BFPT: density {} bytes", device_size);

    let address_bytes = AddressBytes::from_bfpt(((dword1 >> 17) & 0x03) as u8);

    let (erase_types, legacy_erase_instruction) = parse_erase_types(table, dword1)?;
    for (i, erase) in erase_types.iter().enumerate() {
        if let Some(erase) = erase {
            log::debug!(
                "BFPT: erase type {}: 0x{:02X} / {} bytes",
                i + 1,
                erase.instruction,
                erase.size
            );
        }
    }

    let page_size = if has_dword(table, 11) {
        match (dword(table, 11) >> 4) & 0x0F {
            0 => opcodes::DEFAULT_PAGE_SIZE,
            n => 1u32 << n,
        }
    } else {
        opcodes::DEFAULT_PAGE_SIZE
    };

    let (quad_enable, qpi_enable) = if has_dword(table, 15) {
        let dword15 = dword(table, 15);
        let qer = ((dword15 >> 20) & 0x07) as u8;
        let quad_enable = QuadEnable::from_qer(qer).unwrap_or_else(|| {
            log::warn!("BFPT: unknown QER code {}, assuming no QE bit", qer);
            QuadEnable::None
        });
        let qpi_bits = ((dword15 >> 4) & 0x1F) as u8;
        let qpi_enable = QpiEnable::from_bfpt(qpi_bits);
        if qpi_enable.is_none() && qpi_bits != 0 {
            log::warn!("BFPT: unsupported QPI enable sequence 0b{:05b}", qpi_bits);
        }
        (quad_enable, qpi_enable)
    } else {
        (QuadEnable::None, None)
    };

    let (soft_reset, four_byte_methods) = if has_dword(table, 16) {
        let dword16 = dword(table, 16);
        (
            SoftResetSupport::from_bfpt(((dword16 >> 8) & 0x3F) as u8),
            FourByteEntryMethods::from_bits_truncate((dword16 >> 24) as u8),
        )
    } else {
        (SoftResetSupport::NotDescribed, FourByteEntryMethods::empty())
    };

    let opi_enable = if has_dword(table, 19) {
        OpiEnable::from_bfpt(((dword(table, 19) >> 4) & 0x1F) as u8)
    } else {
        None
    };

    let candidates = ReadCandidates {
        table,
        xspi,
        qpi_enable,
        opi_enable,
    };
    let read_profile = IoMode::PRIORITY
        .iter()
        .filter(|mode| supported.contains(mode.required_feature()))
        .find_map(|&mode| candidates.profile(mode))
        .unwrap_or_default();
    log::debug!(
        "BFPT: read profile {} 0x{:02X}, {} mode / {} dummy clocks",
        read_profile.mode,
        read_profile.instruction,
        read_profile.mode_clocks,
        read_profile.dummy_cycles
    );

    Ok(GeometryInfo {
        revision: SfdpRevision::default(),
        device_size,
        page_size,
        address_bytes,
        four_byte_methods,
        erase_types,
        legacy_erase_instruction,
        read_profile,
        quad_enable,
        soft_reset,
        qpi_enable,
        opi_enable,
    })
}

/// Decode DWORD2 into bytes
///
/// Bit 31 clear: bits [30:0] are the size in bits minus one. Bit 31 set:
/// bits [30:0] are N with a size of 2^N bits.
fn parse_density(dword2: u32) -> Result<u64, SfdpError> {
    let value = dword2 & 0x7FFF_FFFF;
    let bytes = if dword2 & (1 << 31) == 0 {
        (value as u64 + 1) / 8
    } else if value < 3 {
        0
    } else if value > 35 {
        log::warn!(
            "BFPT: density 2^{} bits exceeds 32-bit addressing, capping at 4 GiB",
            value
        );
        MAX_DENSITY_BYTES
    } else {
        1u64 << (value - 3)
    };

    if bytes == 0 {
        return Err(SfdpError::ZeroDensity);
    }
    Ok(bytes)
}

/// Erase type slots from DWORD8/9, or the DWORD1 legacy 4 KiB opcode
fn parse_erase_types(
    table: &[u8],
    dword1: u32,
) -> Result<([Option<EraseType>; 4], Option<u8>), SfdpError> {
    let mut types = [None; 4];
    if has_dword(table, 9) {
        let raw = [dword(table, 8).to_le_bytes(), dword(table, 9).to_le_bytes()];
        for (i, slot) in types.iter_mut().enumerate() {
            let pair = &raw[i / 2][(i % 2) * 2..(i % 2) * 2 + 2];
            *slot = EraseType::from_raw(pair[0], pair[1]);
        }
    }

    if types.iter().any(Option::is_some) {
        return Ok((types, None));
    }

    // Bits [1:0] == 01 advertise the uniform 4 KiB erase in bits [15:8]
    let legacy = ((dword1 >> 8) & 0xFF) as u8;
    if dword1 & 0x03 == 0x01 && legacy != 0x00 && legacy != 0xFF {
        log::debug!("BFPT: no erase type table, using legacy 4K erase 0x{:02X}", legacy);
        types[0] = Some(EraseType {
            instruction: legacy,
            size: 4096,
        });
        return Ok((types, Some(legacy)));
    }

    Err(SfdpError::NoEraseInstruction)
}

/// Per-mode read parameters pulled from the fixed table offsets
struct ReadCandidates<'a> {
    table: &'a [u8],
    xspi: Option<&'a XspiProfile>,
    qpi_enable: Option<QpiEnable>,
    opi_enable: Option<OpiEnable>,
}

impl ReadCandidates<'_> {
    fn profile(&self, mode: IoMode) -> Option<ReadProfile> {
        let dword1 = dword(self.table, 1);
        let dword5 = dword(self.table, 5);
        let bit = |d: u32, n: u32| d & (1 << n) != 0;

        let params = match mode {
            IoMode::Opi => {
                let xspi = self.xspi?;
                self.opi_enable?;
                if xspi.read_fast_opcode == 0 {
                    return None;
                }
                FastReadParams {
                    opcode: xspi.read_fast_opcode,
                    mode_clocks: 0,
                    dummy_clocks: xspi.dummy_cycles,
                }
            }
            IoMode::Qpi => {
                if !bit(dword5, 4) {
                    return None;
                }
                self.qpi_enable?;
                FastReadParams::from_high_half(dword(self.table, 7))
            }
            IoMode::QuadIo if bit(dword1, 21) => FastReadParams::from_low_half(dword(self.table, 3)),
            IoMode::QuadOut if bit(dword1, 22) => {
                FastReadParams::from_high_half(dword(self.table, 3))
            }
            IoMode::Dpi if bit(dword5, 0) => FastReadParams::from_high_half(dword(self.table, 6)),
            IoMode::DualIo if bit(dword1, 20) => {
                FastReadParams::from_high_half(dword(self.table, 4))
            }
            IoMode::DualOut if bit(dword1, 16) => {
                FastReadParams::from_low_half(dword(self.table, 4))
            }
            IoMode::Single => return Some(ReadProfile::legacy()),
            _ => return None,
        };

        params.is_supported().then_some(ReadProfile {
            mode,
            instruction: params.opcode,
            mode_clocks: params.mode_clocks,
            dummy_cycles: params.dummy_clocks,
        })
    }
}
