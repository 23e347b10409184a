//! Erase planning over a region table
//!
//! Planning is pure: it turns an `(addr, len)` request into a sequence of
//! erase units without touching the bus, so an invalid request can be
//! rejected before any hardware side effect.

use crate::error::{Error, Result};
use crate::sfdp::RegionTable;

/// One erase command to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseStep {
    /// Erase type slot (0-based)
    pub slot: usize,
    /// First address erased
    pub addr: u64,
    /// Unit size in bytes
    pub size: u32,
}

/// Check an erase request against the region table
///
/// `addr` must sit on a boundary of the smallest erase type of its region,
/// and `addr + len` on a boundary of the smallest erase type of the region
/// holding the last erased byte. The range must lie inside the device.
pub fn validate_erase(table: &RegionTable, addr: u64, len: u64) -> Result<()> {
    let end = addr.checked_add(len).ok_or(Error::InvalidEraseParams)?;
    if end > table.device_size() {
        log::error!(
            "erase 0x{:X}+0x{:X} past end of device (0x{:X})",
            addr,
            len,
            table.device_size()
        );
        return Err(Error::InvalidEraseParams);
    }
    if len == 0 {
        return Ok(());
    }

    let start_unit = table.min_erase_size_at(addr) as u64;
    let end_unit = table.min_erase_size_at(end - 1) as u64;
    if start_unit == 0 || end_unit == 0 || addr % start_unit != 0 || end % end_unit != 0 {
        log::error!("erase 0x{:X}+0x{:X} not aligned to an erase unit", addr, len);
        return Err(Error::InvalidEraseParams);
    }
    Ok(())
}

/// Validate a request and return its erase units
///
/// The whole plan is walked once before it is handed out, so a request that
/// cannot be covered fails here rather than halfway through.
pub fn plan_erase(table: &RegionTable, addr: u64, len: u64) -> Result<EraseSteps<'_>> {
    validate_erase(table, addr, len)?;
    for step in EraseSteps::new(table, addr, len) {
        step?;
    }
    Ok(EraseSteps::new(table, addr, len))
}

/// Iterator over the erase units covering a range
///
/// At each position the largest erase type is chosen that the current
/// region supports, that the address is aligned to, that fits in what is
/// left of the request, and that does not run past the region's high
/// boundary.
///
/// Natural alignment is one of those conditions rather than a lookahead, so
/// an unaligned start walks up in small units: `[0x1000, 0x11000)` with
/// 4K/32K/64K types yields seven 4K units, one 32K unit and a final 4K unit,
/// never a 64K one.
#[derive(Debug, Clone)]
pub struct EraseSteps<'a> {
    table: &'a RegionTable,
    addr: u64,
    end: u64,
    failed: bool,
}

impl<'a> EraseSteps<'a> {
    /// Plan `[addr, addr + len)` without validating it first
    pub fn new(table: &'a RegionTable, addr: u64, len: u64) -> Self {
        Self {
            table,
            addr,
            end: addr.saturating_add(len),
            failed: false,
        }
    }

    fn choose(&self) -> Option<EraseStep> {
        let index = self.table.region_index(self.addr)?;
        let region = self.table.regions()[index];
        let remaining = self.end - self.addr;

        self.table
            .erase_types()
            .iter()
            .enumerate()
            .filter(|(slot, _)| region.erase_types.has_slot(*slot))
            .filter_map(|(slot, t)| t.map(|t| (slot, t.size as u64)))
            .filter(|&(_, size)| {
                self.addr % size == 0
                    && size <= remaining
                    && self.addr + size - 1 <= region.high_boundary
            })
            .max_by_key(|&(_, size)| size)
            .map(|(slot, size)| EraseStep {
                slot,
                addr: self.addr,
                size: size as u32,
            })
    }
}

impl Iterator for EraseSteps<'_> {
    type Item = Result<EraseStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.addr >= self.end {
            return None;
        }
        match self.choose() {
            Some(step) => {
                self.addr += step.size as u64;
                Some(Ok(step))
            }
            None => {
                self.failed = true;
                Some(Err(Error::InvalidEraseParams))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfdp::{parse_sector_map, EraseType};
    use std::vec::Vec;

    const TYPES: [Option<EraseType>; 4] = [
        Some(EraseType { instruction: 0x20, size: 0x1000 }),
        Some(EraseType { instruction: 0x52, size: 0x8000 }),
        Some(EraseType { instruction: 0xD8, size: 0x10000 }),
        None,
    ];

    fn region(size: u64, mask: u8) -> [u8; 4] {
        ((((size / 256) - 1) as u32) << 8 | mask as u32).to_le_bytes()
    }

    /// 0..0x1000: 4K+32K, ..0x1000000: 4K/32K/64K, rest: 64K only
    fn three_regions() -> RegionTable {
        let mut map = [0u8; 16];
        map[..4].copy_from_slice(&[0x03, 0x00, 0x02, 0xFF]);
        map[4..8].copy_from_slice(&region(0x1000, 0b011));
        map[8..12].copy_from_slice(&region(0x00FF_F000, 0b111));
        map[12..16].copy_from_slice(&region(0x0100_0000, 0b100));
        parse_sector_map(&map, 0x0200_0000, &TYPES).unwrap()
    }

    fn sizes(table: &RegionTable, addr: u64, len: u64) -> Vec<u32> {
        plan_erase(table, addr, len)
            .unwrap()
            .map(|s| s.unwrap().size)
            .collect()
    }

    #[test]
    fn test_aligned_block_uses_largest_unit() {
        let table = three_regions();
        assert_eq!(sizes(&table, 0x10000, 0x10000), [0x10000]);
        assert_eq!(sizes(&table, 0x10000, 0x20000), [0x10000, 0x10000]);
    }

    #[test]
    fn test_unaligned_start_steps_up() {
        let table = three_regions();
        let mut expected = std::vec![0x1000; 7];
        expected.push(0x8000);
        expected.push(0x1000);
        assert_eq!(sizes(&table, 0x1000, 0x10000), expected);
    }

    #[test]
    fn test_steps_stay_inside_region() {
        let table = three_regions();
        // Region 0 is a single 4K unit even though it supports 32K
        let steps: Vec<_> = plan_erase(&table, 0, 0x10000)
            .unwrap()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(steps[0], EraseStep { slot: 0, addr: 0, size: 0x1000 });
        for step in &steps {
            let index = table.region_index(step.addr).unwrap();
            assert!(table.regions()[index].erase_types.has_slot(step.slot));
            assert!(step.addr + step.size as u64 - 1 <= table.regions()[index].high_boundary);
        }
        let total: u64 = steps.iter().map(|s| s.size as u64).sum();
        assert_eq!(total, 0x10000);
    }

    #[test]
    fn test_crossing_into_64k_only_region() {
        let table = three_regions();
        assert_eq!(
            sizes(&table, 0x00FF_8000, 0x18000),
            [0x8000, 0x10000]
        );
    }

    #[test]
    fn test_invalid_requests() {
        let table = three_regions();
        assert_eq!(validate_erase(&table, 0x800, 0x1000), Err(Error::InvalidEraseParams));
        assert_eq!(validate_erase(&table, 0x1000, 0x800), Err(Error::InvalidEraseParams));
        // 4K alignment is not enough in the 64K-only region
        assert_eq!(
            validate_erase(&table, 0x0100_1000, 0x1000),
            Err(Error::InvalidEraseParams)
        );
        assert_eq!(
            validate_erase(&table, 0x01FF_0000, 0x20000),
            Err(Error::InvalidEraseParams)
        );
        assert_eq!(
            validate_erase(&table, u64::MAX, 2),
            Err(Error::InvalidEraseParams)
        );
        assert!(plan_erase(&table, 0x0100_0000, 0x1000).is_err());
    }

    #[test]
    fn test_zero_length() {
        let table = three_regions();
        assert_eq!(plan_erase(&table, 0x1000, 0).unwrap().count(), 0);
    }

    #[test]
    fn test_uniform_device() {
        let table = RegionTable::single(0x0100_0000, &TYPES);
        assert_eq!(sizes(&table, 0, 0x0100_0000).len(), 256);
        assert_eq!(sizes(&table, 0x3000, 0x6000), [0x1000, 0x1000, 0x1000, 0x1000, 0x1000, 0x1000]);
    }
}
