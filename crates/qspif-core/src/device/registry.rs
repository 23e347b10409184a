//! Process-wide chip-select registry
//!
//! At most one live device may drive a given chip select. Devices claim
//! their chip select when they are constructed (and again on a first init
//! after a full deinit) and release it when the last reference goes away.

use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Maximum number of devices registered at once
pub const MAX_DEVICES: usize = 10;

/// Chip select line identifying a physical device on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChipSelect(pub u32);

impl core::fmt::Display for ChipSelect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "CS{}", self.0)
    }
}

/// Set of chip selects currently bound to a device
#[derive(Debug)]
pub struct ChipSelectRegistry {
    claimed: Mutex<heapless::Vec<ChipSelect, MAX_DEVICES>>,
}

static GLOBAL: ChipSelectRegistry = ChipSelectRegistry::new();

impl ChipSelectRegistry {
    /// An empty registry
    pub const fn new() -> Self {
        Self {
            claimed: Mutex::new(heapless::Vec::new()),
        }
    }

    /// The registry shared by every device in the process
    pub fn global() -> &'static ChipSelectRegistry {
        &GLOBAL
    }

    fn lock(&self) -> MutexGuard<'_, heapless::Vec<ChipSelect, MAX_DEVICES>> {
        // The list is never left half-updated, so a poisoned lock is still usable
        match self.claimed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Bind `csel` to the caller
    pub fn claim(&self, csel: ChipSelect) -> Result<()> {
        let mut claimed = self.lock();
        if claimed.contains(&csel) {
            log::error!("{} is already in use", csel);
            return Err(Error::DeviceNotUnique);
        }
        claimed.push(csel).map_err(|_| {
            log::error!("cannot register {}: {} devices already active", csel, MAX_DEVICES);
            Error::DeviceMaxExceeded
        })?;
        log::debug!("registered {}", csel);
        Ok(())
    }

    /// Free `csel`; releasing an unclaimed chip select does nothing
    pub fn release(&self, csel: ChipSelect) {
        let mut claimed = self.lock();
        if let Some(pos) = claimed.iter().position(|c| *c == csel) {
            claimed.swap_remove(pos);
            log::debug!("released {}", csel);
        }
    }

    /// Whether `csel` is currently claimed
    pub fn is_claimed(&self, csel: ChipSelect) -> bool {
        self.lock().contains(&csel)
    }

    /// Number of claimed chip selects
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no chip select is claimed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChipSelectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_claim() {
        let registry = ChipSelectRegistry::new();
        registry.claim(ChipSelect(3)).unwrap();
        assert_eq!(registry.claim(ChipSelect(3)), Err(Error::DeviceNotUnique));
        registry.release(ChipSelect(3));
        assert!(registry.claim(ChipSelect(3)).is_ok());
    }

    #[test]
    fn test_capacity() {
        let registry = ChipSelectRegistry::new();
        for cs in 0..MAX_DEVICES as u32 {
            registry.claim(ChipSelect(cs)).unwrap();
        }
        assert_eq!(registry.claim(ChipSelect(99)), Err(Error::DeviceMaxExceeded));
        registry.release(ChipSelect(0));
        assert!(registry.claim(ChipSelect(99)).is_ok());
        assert_eq!(registry.len(), MAX_DEVICES);
    }

    #[test]
    fn test_release_unclaimed() {
        let registry = ChipSelectRegistry::new();
        registry.release(ChipSelect(1));
        assert!(registry.is_empty());
        assert!(!registry.is_claimed(ChipSelect(1)));
    }
}
