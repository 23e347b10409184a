//! Sector Map Table interpretation and the region table

use crate::error::SfdpError;

use super::types::*;

/// A contiguous address range sharing one set of erase types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Last address in the region (inclusive)
    pub high_boundary: u64,
    /// Erase types available in the region
    pub erase_types: EraseTypeMask,
}

/// Regions covering `[0, device_size)` in address order
///
/// Boundaries are strictly increasing and contiguous, and every region has
/// at least one erase type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RegionTable {
    regions: heapless::Vec<Region, MAX_REGIONS>,
    erase_types: [Option<EraseType>; 4],
    min_common_erase_size: u32,
}

impl RegionTable {
    /// One region spanning the whole device with every discovered erase type
    pub fn single(device_size: u64, erase_types: &[Option<EraseType>; 4]) -> Self {
        let mut regions = heapless::Vec::new();
        // capacity is MAX_REGIONS
        let _ = regions.push(Region {
            high_boundary: device_size.saturating_sub(1),
            erase_types: EraseTypeMask::present(erase_types),
        });
        Self::from_regions(regions, erase_types)
    }

    fn from_regions(
        regions: heapless::Vec<Region, MAX_REGIONS>,
        erase_types: &[Option<EraseType>; 4],
    ) -> Self {
        let common = regions
            .iter()
            .fold(EraseTypeMask::all(), |mask, r| mask & r.erase_types);
        let min_common_erase_size = min_size(erase_types, common).unwrap_or_else(|| {
            log::warn!("no erase type is common to every region");
            0
        });
        Self {
            regions,
            erase_types: *erase_types,
            min_common_erase_size,
        }
    }

    /// The regions in address order
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Erase type slots the region bitfields refer to
    pub fn erase_types(&self) -> &[Option<EraseType>; 4] {
        &self.erase_types
    }

    /// Smallest erase size available in every region, 0 if none is common
    pub fn min_common_erase_size(&self) -> u32 {
        self.min_common_erase_size
    }

    /// Size covered by the regions
    pub fn device_size(&self) -> u64 {
        self.regions.last().map_or(0, |r| r.high_boundary + 1)
    }

    /// Index of the region containing `addr`
    pub fn region_index(&self, addr: u64) -> Option<usize> {
        self.regions.iter().position(|r| addr <= r.high_boundary)
    }

    /// First address of region `index`
    pub fn region_start(&self, index: usize) -> u64 {
        match index {
            0 => 0,
            i => self.regions[i - 1].high_boundary + 1,
        }
    }

    /// Smallest erase size available in region `index`
    pub fn min_erase_size_in(&self, index: usize) -> u32 {
        self.regions
            .get(index)
            .and_then(|r| min_size(&self.erase_types, r.erase_types))
            .unwrap_or(0)
    }

    /// Smallest erase size available at `addr`, 0 past the end of the device
    pub fn min_erase_size_at(&self, addr: u64) -> u32 {
        self.region_index(addr)
            .map_or(0, |index| self.min_erase_size_in(index))
    }

    /// Drop everything at or above `size`
    ///
    /// Used when the device can only be addressed with 24 bits.
    pub fn truncate_to(&mut self, size: u64) {
        if size == 0 || size >= self.device_size() {
            return;
        }
        if let Some(last) = self.region_index(size - 1) {
            self.regions.truncate(last + 1);
            self.regions[last].high_boundary = size - 1;
        }
        let erase_types = self.erase_types;
        let regions = core::mem::take(&mut self.regions);
        *self = Self::from_regions(regions, &erase_types);
    }
}

fn min_size(erase_types: &[Option<EraseType>; 4], mask: EraseTypeMask) -> Option<u32> {
    erase_types
        .iter()
        .enumerate()
        .filter(|(i, _)| mask.has_slot(*i))
        .filter_map(|(_, t)| t.map(|t| t.size))
        .min()
}

/// Interpret a Sector Map Table
///
/// Only a single map descriptor (configuration ID 0, no detection commands)
/// is supported. Each region bitfield is masked by `erase_types`; the
/// regions must cover exactly `device_size` bytes.
pub fn parse_sector_map(
    table: &[u8],
    device_size: u64,
    erase_types: &[Option<EraseType>; 4],
) -> Result<RegionTable, SfdpError> {
    if !has_dword(table, 1) {
        return Err(SfdpError::TableTooShort {
            table: "sector map",
            len: table.len(),
        });
    }

    let header = dword(table, 1).to_le_bytes();
    if header[0] & 0x03 != 0x03 {
        return Err(SfdpError::SectorMap("only a single map descriptor is supported"));
    }
    if header[1] != 0 {
        return Err(SfdpError::SectorMap("configuration detection is not supported"));
    }

    let count = header[2] as usize + 1;
    if count > MAX_REGIONS {
        return Err(SfdpError::SectorMap("too many regions"));
    }
    if !has_dword(table, 1 + count) {
        return Err(SfdpError::TableTooShort {
            table: "sector map",
            len: table.len(),
        });
    }

    let available = EraseTypeMask::present(erase_types);
    let mut regions = heapless::Vec::new();
    let mut start = 0u64;
    for i in 0..count {
        let raw = dword(table, 2 + i);
        let mask = EraseTypeMask::from_bits_truncate((raw & 0x0F) as u8) & available;
        let size = ((raw >> 8) as u64 + 1) * 256;
        if mask.is_empty() {
            return Err(SfdpError::SectorMap("region has no usable erase type"));
        }

        let region = Region {
            high_boundary: start + size - 1,
            erase_types: mask,
        };
        log::debug!(
            "sector map: region {} 0x{:08X}..=0x{:08X} types {:?}",
            i,
            start,
            region.high_boundary,
            mask
        );
        regions
            .push(region)
            .map_err(|_| SfdpError::SectorMap("too many regions"))?;
        start += size;
    }

    if start != device_size {
        return Err(SfdpError::SectorMap("regions do not cover the device"));
    }

    Ok(RegionTable::from_regions(regions, erase_types))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [Option<EraseType>; 4] = [
        Some(EraseType { instruction: 0x20, size: 4096 }),
        Some(EraseType { instruction: 0x52, size: 32768 }),
        Some(EraseType { instruction: 0xD8, size: 65536 }),
        None,
    ];

    fn region_dword(size: u64, mask: u8) -> [u8; 4] {
        ((((size / 256) - 1) as u32) << 8 | mask as u32).to_le_bytes()
    }

    fn three_region_map() -> [u8; 16] {
        let mut table = [0u8; 16];
        table[..4].copy_from_slice(&[0x03, 0x00, 0x02, 0xFF]);
        table[4..8].copy_from_slice(&region_dword(0x1000, 0b0011));
        table[8..12].copy_from_slice(&region_dword(0x00FF_F000, 0b0111));
        table[12..16].copy_from_slice(&region_dword(0x0100_0000, 0b0100));
        table
    }

    #[test]
    fn test_three_regions() {
        let table = parse_sector_map(&three_region_map(), 0x0200_0000, &TYPES).unwrap();
        let regions = table.regions();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].high_boundary, 0x0FFF);
        assert_eq!(regions[1].high_boundary, 0x00FF_FFFF);
        assert_eq!(regions[2].high_boundary, 0x01FF_FFFF);
        assert_eq!(table.device_size(), 0x0200_0000);

        // No type is common to all three regions
        assert_eq!(table.min_common_erase_size(), 0);
        assert_eq!(table.min_erase_size_at(0x0), 4096);
        assert_eq!(table.min_erase_size_at(0x1000), 4096);
        assert_eq!(table.min_erase_size_at(0x0100_0000), 65536);
        assert_eq!(table.min_erase_size_at(0x0200_0000), 0);
    }

    #[test]
    fn test_region_partition() {
        let table = parse_sector_map(&three_region_map(), 0x0200_0000, &TYPES).unwrap();
        for addr in [0u64, 0xFFF, 0x1000, 0xFF_FFFF, 0x100_0000, 0x1FF_FFFF] {
            let index = table.region_index(addr).unwrap();
            assert!(table.region_start(index) <= addr);
            assert!(addr <= table.regions()[index].high_boundary);
        }
        assert_eq!(table.region_index(0x200_0000), None);
    }

    #[test]
    fn test_coverage_mismatch() {
        assert_eq!(
            parse_sector_map(&three_region_map(), 0x0400_0000, &TYPES),
            Err(SfdpError::SectorMap("regions do not cover the device"))
        );
    }

    #[test]
    fn test_region_masked_to_empty() {
        let mut table = three_region_map();
        table[12..16].copy_from_slice(&region_dword(0x0100_0000, 0b1000));
        assert!(matches!(
            parse_sector_map(&table, 0x0200_0000, &TYPES),
            Err(SfdpError::SectorMap(_))
        ));
    }

    #[test]
    fn test_rejects_command_descriptor() {
        let mut table = three_region_map();
        table[0] = 0x00;
        assert!(parse_sector_map(&table, 0x0200_0000, &TYPES).is_err());
    }

    #[test]
    fn test_truncated_table() {
        let table = three_region_map();
        assert!(matches!(
            parse_sector_map(&table[..12], 0x0200_0000, &TYPES),
            Err(SfdpError::TableTooShort { .. })
        ));
    }

    #[test]
    fn test_single_region() {
        let table = RegionTable::single(0x0100_0000, &TYPES);
        assert_eq!(table.regions().len(), 1);
        assert_eq!(table.min_common_erase_size(), 4096);
        assert_eq!(table.regions()[0].erase_types, EraseTypeMask::from_bits_truncate(0b0111));
    }

    #[test]
    fn test_truncate_to_16mib() {
        let mut table = parse_sector_map(&three_region_map(), 0x0200_0000, &TYPES).unwrap();
        table.truncate_to(0x0100_0000);
        assert_eq!(table.regions().len(), 2);
        assert_eq!(table.device_size(), 0x0100_0000);
        assert_eq!(table.min_common_erase_size(), 4096);
    }
}
