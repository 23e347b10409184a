//! SFDP header parsing and table discovery
//!
//! Everything here reads SFDP through a caller-supplied closure so it can
//! run against a live transport or a byte image alike.

use crate::bus::BusFeatures;
use crate::error::{Result, SfdpError};

use super::basic::parse_basic_table;
use super::sector_map::{parse_sector_map, RegionTable};
use super::types::*;

/// Parse the SFDP header and the parameter-header table
///
/// `read_sfdp(addr, buf)` must fill `buf` from the SFDP address space.
/// Parameter header 0 must describe the Basic Flash Parameter Table. A later
/// basic-table header with major revision 1 and a longer table replaces it.
/// Sector map, 4-byte instruction and xSPI headers are optional.
pub fn parse_headers<F>(mut read_sfdp: F) -> Result<SfdpDescriptor>
where
    F: FnMut(u32, &mut [u8]) -> Result<()>,
{
    let mut buf = [0u8; 8];
    read_sfdp(0x00, &mut buf)?;
    log::debug!("SFDP header bytes: {:02X?}", buf);

    let header = SfdpHeader::parse(&buf);
    if !header.is_valid() {
        log::debug!("SFDP signature invalid (expected 'SFDP')");
        return Err(SfdpError::BadSignature(header.signature).into());
    }
    if header.revision.major != 1 {
        log::debug!("SFDP major version {} not supported", header.revision.major);
        return Err(SfdpError::UnsupportedRevision {
            major: header.revision.major,
            minor: header.revision.minor,
        }
        .into());
    }

    let count = header.num_param_headers().min(MAX_PARAMETER_HEADERS);
    log::debug!(
        "SFDP revision {}, {} parameter header(s)",
        header.revision,
        count
    );

    let mut descriptor = SfdpDescriptor {
        revision: header.revision,
        ..Default::default()
    };

    for index in 0..count {
        let addr = 0x08 + (index as u32) * 8;
        read_sfdp(addr, &mut buf)?;
        let param = ParameterHeader::parse(&buf);
        log::debug!(
            "parameter header {}: id 0x{:04X} rev {} len {} ptr 0x{:06X}",
            index,
            param.id,
            param.revision,
            param.length_bytes(),
            param.table_pointer
        );

        if index == 0 {
            if param.id != PARAM_ID_BASIC {
                return Err(SfdpError::MissingBasicTable(param.id).into());
            }
            if param.revision.major != 1 {
                return Err(SfdpError::UnsupportedRevision {
                    major: param.revision.major,
                    minor: param.revision.minor,
                }
                .into());
            }
            descriptor.basic = param.location();
            continue;
        }

        match param.id {
            PARAM_ID_BASIC
                if param.revision.major == 1 && param.length_bytes() > descriptor.basic.len =>
            {
                descriptor.basic = param.location();
            }
            PARAM_ID_SECTOR_MAP => descriptor.sector_map = Some(param.location()),
            PARAM_ID_4BYTE_ADDR => descriptor.four_byte = Some(param.location()),
            PARAM_ID_XSPI_1_0 => descriptor.xspi = Some(param.location()),
            _ => {}
        }
    }

    Ok(descriptor)
}

/// Parse the 4-byte Address Instruction Table
pub fn parse_four_byte_table(table: &[u8]) -> core::result::Result<FourByteTable, SfdpError> {
    if !has_dword(table, 2) {
        return Err(SfdpError::TableTooShort {
            table: "4-byte instruction",
            len: table.len(),
        });
    }
    Ok(FourByteTable::from_dwords(dword(table, 1), dword(table, 2)))
}

/// Parse the fields used from the xSPI Profile 1.0 table
///
/// DWORD1 bits [15:8] hold the 8-8-8 read opcode and DWORD4 bits [31:27]
/// its dummy cycles; zero dummy cycles means the default of 20.
pub fn parse_xspi_table(table: &[u8]) -> core::result::Result<XspiProfile, SfdpError> {
    if !has_dword(table, 4) {
        return Err(SfdpError::TableTooShort {
            table: "xSPI profile",
            len: table.len(),
        });
    }
    let read_fast_opcode = ((dword(table, 1) >> 8) & 0xFF) as u8;
    let dummy_cycles = match ((dword(table, 4) >> 27) & 0x1F) as u8 {
        0 => 20,
        n => n,
    };
    Ok(XspiProfile {
        read_fast_opcode,
        dummy_cycles,
    })
}

/// Result of a full SFDP discovery pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Located tables
    pub descriptor: SfdpDescriptor,
    /// Basic table interpretation
    pub geometry: GeometryInfo,
    /// Erase regions
    pub regions: RegionTable,
    /// 4-byte instruction table, if present and well-formed
    pub four_byte: Option<FourByteTable>,
}

/// Run the header parser and every table interpreter
///
/// Only the read modes in `supported` (plus 1-1-1) are considered for the
/// read profile.
pub fn discover<F>(mut read_sfdp: F, supported: BusFeatures) -> Result<Discovery>
where
    F: FnMut(u32, &mut [u8]) -> Result<()>,
{
    let descriptor = parse_headers(&mut read_sfdp)?;

    let xspi = match descriptor.xspi {
        Some(loc) if loc.len >= XSPI_TABLE_LEN => {
            let mut buf = [0u8; XSPI_TABLE_LEN];
            read_sfdp(loc.addr, &mut buf)?;
            Some(parse_xspi_table(&buf)?)
        }
        _ => None,
    };

    let mut basic = [0u8; MAX_BASIC_TABLE_LEN];
    let basic_len = descriptor.basic.len.min(MAX_BASIC_TABLE_LEN);
    read_sfdp(descriptor.basic.addr, &mut basic[..basic_len])?;
    let mut geometry = parse_basic_table(&basic[..basic_len], xspi.as_ref(), supported)?;
    geometry.revision = descriptor.revision;

    let regions = match descriptor.sector_map {
        Some(loc) => {
            let mut buf = [0u8; MAX_SECTOR_MAP_LEN];
            let len = loc.len.min(MAX_SECTOR_MAP_LEN);
            read_sfdp(loc.addr, &mut buf[..len])?;
            parse_sector_map(&buf[..len], geometry.device_size, &geometry.erase_types)?
        }
        None => RegionTable::single(geometry.device_size, &geometry.erase_types),
    };

    let four_byte = match descriptor.four_byte {
        Some(loc) => {
            let mut buf = [0u8; FOUR_BYTE_TABLE_LEN];
            let len = loc.len.min(FOUR_BYTE_TABLE_LEN);
            read_sfdp(loc.addr, &mut buf[..len])?;
            match parse_four_byte_table(&buf[..len]) {
                Ok(table) => Some(table),
                Err(e) => {
                    log::warn!("ignoring 4-byte instruction table: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    Ok(Discovery {
        descriptor,
        geometry,
        regions,
        four_byte,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn image_reader(image: &[u8]) -> impl FnMut(u32, &mut [u8]) -> Result<()> + '_ {
        move |addr, buf| {
            for (i, b) in buf.iter_mut().enumerate() {
                *b = image.get(addr as usize + i).copied().unwrap_or(0xFF);
            }
            Ok(())
        }
    }

    fn header(nph: u8) -> [u8; 8] {
        [b'S', b'F', b'D', b'P', 0x06, 0x01, nph, 0xFF]
    }

    #[test]
    fn test_bad_signature() {
        let mut image = [0u8; 16];
        image[..8].copy_from_slice(&[b'S', b'F', b'D', b'Q', 0x06, 0x01, 0, 0xFF]);
        let result = parse_headers(image_reader(&image));
        assert_eq!(result, Err(Error::ParsingFailed));
    }

    #[test]
    fn test_unsupported_major() {
        let mut image = [0u8; 16];
        image[..8].copy_from_slice(&[b'S', b'F', b'D', b'P', 0x00, 0x02, 0, 0xFF]);
        assert_eq!(parse_headers(image_reader(&image)), Err(Error::ParsingFailed));
    }

    #[test]
    fn test_first_header_must_be_basic() {
        let mut image = [0u8; 16];
        image[..8].copy_from_slice(&header(0));
        image[8..16].copy_from_slice(&[0x81, 0x00, 0x01, 0x02, 0x40, 0x00, 0x00, 0xFF]);
        assert_eq!(parse_headers(image_reader(&image)), Err(Error::ParsingFailed));
    }

    #[test]
    fn test_optional_tables_located() {
        let mut image = [0u8; 48];
        image[..8].copy_from_slice(&header(3));
        image[8..16].copy_from_slice(&[0x00, 0x06, 0x01, 0x10, 0x00, 0x01, 0x00, 0xFF]);
        image[16..24].copy_from_slice(&[0x81, 0x00, 0x01, 0x03, 0x40, 0x01, 0x00, 0xFF]);
        image[24..32].copy_from_slice(&[0x84, 0x00, 0x01, 0x02, 0x80, 0x01, 0x00, 0xFF]);
        image[32..40].copy_from_slice(&[0x42, 0x00, 0x01, 0x02, 0x90, 0x01, 0x00, 0xC2]);

        let descriptor = parse_headers(image_reader(&image)).unwrap();
        assert_eq!(descriptor.revision, SfdpRevision::new(1, 6));
        assert_eq!(descriptor.basic, TableLocation { addr: 0x100, len: 64 });
        assert_eq!(
            descriptor.sector_map,
            Some(TableLocation { addr: 0x140, len: 12 })
        );
        assert_eq!(
            descriptor.four_byte,
            Some(TableLocation { addr: 0x180, len: 8 })
        );
        assert_eq!(descriptor.xspi, None);
    }

    #[test]
    fn test_missing_optional_tables() {
        let mut image = [0u8; 16];
        image[..8].copy_from_slice(&header(0));
        image[8..16].copy_from_slice(&[0x00, 0x00, 0x01, 0x09, 0x10, 0x00, 0x00, 0xFF]);
        let descriptor = parse_headers(image_reader(&image)).unwrap();
        assert_eq!(descriptor.basic, TableLocation { addr: 0x10, len: 36 });
        assert!(descriptor.sector_map.is_none());
        assert!(descriptor.four_byte.is_none());
    }

    #[test]
    fn test_xspi_dummy_default() {
        let mut table = [0u8; 16];
        table[1] = 0xEE;
        let profile = parse_xspi_table(&table).unwrap();
        assert_eq!(profile.read_fast_opcode, 0xEE);
        assert_eq!(profile.dummy_cycles, 20);

        table[15] = 16 << 3;
        assert_eq!(parse_xspi_table(&table).unwrap().dummy_cycles, 16);
        assert!(parse_xspi_table(&table[..8]).is_err());
    }
}
