//! SFDP-driven QSPI flash block device
//!
//! [`QspifBlockDevice`] owns a [`QspiBus`] behind a mutex. Every logical
//! operation (the write-enable handshake, the transfer and the ready poll)
//! runs with the mutex held, so operations from different threads never
//! interleave on the wire. The bus format is switched to the read profile
//! only for the duration of a read and restored before the lock is
//! released.

mod registry;

pub use registry::{ChipSelect, ChipSelectRegistry, MAX_DEVICES};

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::block_device::BlockDevice;
use crate::bus::QspiBus;
use crate::config::DeviceConfig;
use crate::erase::plan_erase;
use crate::error::{Error, Result, SfdpError};
use crate::negotiate::{negotiate, Negotiated, THREE_BYTE_LIMIT};
use crate::protocol::{self, ReadyPoll};
use crate::quirks::{self, VendorQuirks};
use crate::sfdp::{
    discover, Discovery, FourByteEntry, GeometryInfo, RegionTable, SoftResetMethod,
    SoftResetSupport,
};
use crate::spi::{AddressWidth, BusFormat, BusWidth, SpiCommand};

/// Device type reported through [`BlockDevice::device_type`]
pub const DEVICE_TYPE: &str = "QSPIF";

/// Mode bits sent with reads that have mode clocks; keeps the device out of
/// continuous-read mode
const READ_MODE_BITS: u32 = 0xFF;

/// What the first successful init learned about the device
#[derive(Debug, Clone)]
struct Cached {
    discovery: Discovery,
    negotiated: Negotiated,
    /// Regions clipped to the reachable size
    regions: RegionTable,
}

struct Inner<B> {
    bus: B,
    registered: bool,
    initialized: bool,
    cache: Option<Cached>,
    /// Width of the protocol mode (QPI/OPI) the device was switched into
    protocol: Option<BusWidth>,
    /// Value last written to the extended address register
    bank: Option<u8>,
    /// Reset sequence resolved at init
    reset: Option<SoftResetMethod>,
    jedec_id: [u8; 3],
}

/// Block device over a serial NOR flash described by SFDP
pub struct QspifBlockDevice<B: QspiBus> {
    inner: Mutex<Inner<B>>,
    init_count: AtomicU32,
    csel: ChipSelect,
    registry: &'static ChipSelectRegistry,
    config: DeviceConfig,
}

impl<B: QspiBus> QspifBlockDevice<B> {
    /// Create a device on `csel`, registered in the process-wide registry
    ///
    /// Fails with [`Error::DeviceNotUnique`] if another live device already
    /// uses `csel`, or [`Error::DeviceMaxExceeded`] if the registry is full.
    pub fn new(bus: B, csel: ChipSelect, config: DeviceConfig) -> Result<Self> {
        Self::new_in(ChipSelectRegistry::global(), bus, csel, config)
    }

    /// Create a device registered in `registry`
    pub fn new_in(
        registry: &'static ChipSelectRegistry,
        bus: B,
        csel: ChipSelect,
        config: DeviceConfig,
    ) -> Result<Self> {
        registry.claim(csel)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                bus,
                registered: true,
                initialized: false,
                cache: None,
                protocol: None,
                bank: None,
                reset: None,
                jedec_id: [0; 3],
            }),
            init_count: AtomicU32::new(0),
            csel,
            registry,
            config,
        })
    }

    /// Chip select this device drives
    pub fn chip_select(&self) -> ChipSelect {
        self.csel
    }

    /// Active configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Whether the device is initialized
    pub fn is_initialized(&self) -> bool {
        self.lock().map(|inner| inner.initialized).unwrap_or(false)
    }

    /// JEDEC ID read during the last init
    pub fn jedec_id(&self) -> Option<[u8; 3]> {
        let inner = self.lock().ok()?;
        inner.cache.as_ref().map(|_| inner.jedec_id)
    }

    /// Geometry and erase regions, once a first init has succeeded
    pub fn geometry(&self) -> Option<(GeometryInfo, RegionTable)> {
        let inner = self.lock().ok()?;
        inner
            .cache
            .as_ref()
            .map(|cache| (cache.discovery.geometry, cache.regions.clone()))
    }

    /// Negotiated command set, once a first init has succeeded
    pub fn negotiated(&self) -> Option<Negotiated> {
        let inner = self.lock().ok()?;
        inner.cache.as_ref().map(|cache| cache.negotiated)
    }

    /// Initialize and return a guard whose [`InitGuard::release`] undoes it
    pub fn acquire(&self) -> Result<InitGuard<'_, B>> {
        self.init()?;
        Ok(InitGuard { device: self })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<B>>> {
        self.inner.lock().map_err(|_| {
            log::error!("{}: device lock poisoned", self.csel);
            Error::DeviceError
        })
    }

    fn poll(&self) -> ReadyPoll {
        self.config.ready_poll()
    }

    /// Hardware bring-up for the 0 -> 1 transition
    fn bring_up(&self, inner: &mut Inner<B>) -> Result<()> {
        if !inner.registered {
            self.registry.claim(self.csel)?;
            inner.registered = true;
        }

        let poll = self.poll();
        let single = BusFormat::single(AddressWidth::ThreeByte);
        let bus = &mut inner.bus;
        bus.set_frequency(self.config.frequency_hz)?;
        bus.configure_format(&single)?;
        protocol::wait_ready(bus, poll)?;

        let id = protocol::read_jedec_id(bus)?;
        inner.jedec_id = id;
        let quirks = quirks::lookup(id[0]);
        log::debug!(
            "{}: JEDEC ID {:02X} {:02X} {:02X} ({})",
            self.csel,
            id[0],
            id[1],
            id[2],
            quirks.name
        );

        let cached = match &inner.cache {
            Some(cached) => cached.clone(),
            None => self.discover(bus, quirks)?,
        };
        let geometry = &cached.discovery.geometry;

        let reset = match self.config.soft_reset.forced() {
            Some(method) => Some(method),
            None => match geometry.soft_reset {
                SoftResetSupport::Method(method) => Some(method),
                SoftResetSupport::NotDescribed => {
                    log::warn!("SFDP describes no soft reset, skipping it");
                    None
                }
                SoftResetSupport::Unsupported => return Err(SfdpError::NoSoftReset.into()),
            },
        };
        if let Some(method) = reset {
            protocol::soft_reset(bus, method)?;
            protocol::wait_ready(bus, poll)?;
        }
        inner.reset = reset;

        let negotiated = &cached.negotiated;
        protocol::clear_block_protection(bus, poll, quirks, geometry.quad_enable)?;
        if negotiated.needs_quad_enable() {
            protocol::enable_quad(bus, poll, geometry.quad_enable, quirks)?;
        }

        inner.protocol = None;
        if let Some(width) = negotiated.protocol_width() {
            enter_protocol(bus, poll, geometry, width)?;
            inner.protocol = Some(width);
            bus.configure_format(&BusFormat::protocol(width, AddressWidth::ThreeByte))?;
            protocol::wait_ready(bus, poll)?;
        }

        if let Some(fast) = quirks.fast_mode {
            protocol::enable_fast_mode(bus, poll, quirks, fast)?;
        }

        protocol::enter_four_byte(bus, poll, negotiated.addressing)?;
        inner.bank = (negotiated.addressing == FourByteEntry::ExtAddrRegister).then_some(0);
        bus.configure_format(&negotiated.default_format(inner.protocol))?;

        log::info!(
            "{}: {} bytes, read {} 0x{:02X}, {:?} addressing, erase unit {}",
            self.csel,
            negotiated.device_size,
            negotiated.read.mode,
            negotiated.read.instruction,
            negotiated.addr_size,
            cached.regions.min_common_erase_size()
        );
        inner.cache = Some(cached);
        Ok(())
    }

    fn discover(&self, bus: &mut B, quirks: &'static VendorQuirks) -> Result<Cached> {
        let single = BusFormat::single(AddressWidth::ThreeByte);
        let features = bus.features();
        let discovery = discover(
            |addr, buf| protocol::read_sfdp(bus, &single, addr, buf),
            features,
        )?;

        let negotiated = negotiate(
            &discovery.geometry,
            discovery.four_byte.as_ref(),
            quirks,
            self.config.enable_fast_read,
        );
        let mut regions = discovery.regions.clone();
        regions.truncate_to(negotiated.device_size);

        Ok(Cached {
            discovery,
            negotiated,
            regions,
        })
    }

    /// Shutdown for the 1 -> 0 transition
    fn shut_down(&self, inner: &mut Inner<B>) -> Result<()> {
        protocol::write_disable(&mut inner.bus)?;
        self.leave_protocol(inner)
    }

    /// Reset the device out of QPI/OPI and put the transport back on 1-1-1
    fn leave_protocol(&self, inner: &mut Inner<B>) -> Result<()> {
        let bus = &mut inner.bus;
        if let Some(width) = inner.protocol.take() {
            bus.configure_format(&BusFormat::protocol(width, AddressWidth::ThreeByte))?;
            match inner.reset {
                Some(method) => {
                    protocol::soft_reset(bus, method)?;
                    inner.bank = None;
                }
                None => log::warn!("{}: no reset sequence to leave protocol mode", self.csel),
            }
        }
        bus.configure_format(&BusFormat::single(AddressWidth::ThreeByte))?;
        Ok(())
    }
}

/// Switch into QPI/OPI using the sequence SFDP describes
fn enter_protocol<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    geometry: &GeometryInfo,
    width: BusWidth,
) -> Result<()> {
    match (width, geometry.qpi_enable, geometry.opi_enable) {
        (BusWidth::Quad, Some(seq), _) => protocol::enter_qpi(bus, poll, seq),
        (BusWidth::Octal, _, Some(seq)) => protocol::enter_opi(bus, poll, seq),
        _ => {
            log::error!("no enable sequence for {:?} protocol mode", width);
            Err(Error::DeviceError)
        }
    }
}

/// Cached state of an initialized device
fn ready(cache: &Option<Cached>, initialized: bool) -> Result<&Cached> {
    match (cache, initialized) {
        (Some(cached), true) => Ok(cached),
        _ => {
            log::error!("operation on uninitialized device");
            Err(Error::DeviceError)
        }
    }
}

fn check_range(negotiated: &Negotiated, addr: u64, len: usize) -> Result<()> {
    match addr.checked_add(len as u64) {
        Some(end) if end <= negotiated.device_size => Ok(()),
        _ => {
            log::error!(
                "access 0x{:X}+0x{:X} past end of device (0x{:X})",
                addr,
                len,
                negotiated.device_size
            );
            Err(Error::DeviceError)
        }
    }
}

/// Wire address for `addr`, updating the extended address register first
/// when the device reaches its upper banks through it
fn bank_address<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    negotiated: &Negotiated,
    bank: &mut Option<u8>,
    addr: u64,
) -> Result<u32> {
    let Some(inst) = negotiated.ext_addr_write_inst else {
        return Ok(addr as u32);
    };
    let msb = (addr >> 24) as u8;
    if *bank != Some(msb) {
        protocol::select_bank(bus, poll, inst, msb)?;
        *bank = Some(msb);
    }
    Ok((addr & (THREE_BYTE_LIMIT - 1)) as u32)
}

/// Length of the part of `[addr, addr + len)` that stays in one bank
fn bank_chunk(negotiated: &Negotiated, addr: u64, len: usize) -> usize {
    if negotiated.ext_addr_write_inst.is_none() {
        return len;
    }
    let to_boundary = THREE_BYTE_LIMIT - (addr % THREE_BYTE_LIMIT);
    len.min(to_boundary as usize)
}

impl<B: QspiBus> BlockDevice for QspifBlockDevice<B> {
    fn init(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if self.init_count.fetch_add(1, Ordering::SeqCst) > 0 {
            log::trace!("{}: init nested", self.csel);
            return Ok(());
        }

        match self.bring_up(&mut inner) {
            Ok(()) => {
                inner.initialized = true;
                Ok(())
            }
            Err(e) => {
                log::error!("{}: init failed: {}", self.csel, e);
                if let Err(cleanup) = self.leave_protocol(&mut inner) {
                    log::warn!("{}: could not leave protocol mode: {}", self.csel, cleanup);
                }
                self.init_count.store(0, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn deinit(&self) -> Result<()> {
        let mut inner = self.lock()?;
        let count = self.init_count.load(Ordering::SeqCst);
        if count == 0 {
            log::debug!("{}: deinit on uninitialized device", self.csel);
            return Ok(());
        }
        self.init_count.store(count - 1, Ordering::SeqCst);
        if count > 1 {
            return Ok(());
        }

        let result = self.shut_down(&mut inner);
        inner.initialized = false;
        if inner.registered {
            self.registry.release(self.csel);
            inner.registered = false;
        }
        if let Err(e) = result {
            log::error!("{}: deinit failed: {}", self.csel, e);
        }
        result
    }

    fn read(&self, buf: &mut [u8], addr: u64) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let cached = ready(&inner.cache, inner.initialized)?;
        let negotiated = &cached.negotiated;
        check_range(negotiated, addr, buf.len())?;

        let poll = self.poll();
        let read_format = negotiated.read_format();
        let restore = negotiated.default_format(inner.protocol);
        let read = negotiated.read;

        let mut addr = addr;
        let mut rest = buf;
        while !rest.is_empty() {
            let len = bank_chunk(negotiated, addr, rest.len());
            let (chunk, tail) = core::mem::take(&mut rest).split_at_mut(len);
            let wire = bank_address(&mut inner.bus, poll, negotiated, &mut inner.bank, addr)?;

            log::trace!("read 0x{:02X} @ 0x{:08X} len {}", read.instruction, wire, len);
            protocol::with_format(&mut inner.bus, &read_format, &restore, |bus| {
                let mut cmd = SpiCommand::read(read.instruction, wire, chunk);
                if read.mode_clocks > 0 {
                    cmd = cmd.with_alt(READ_MODE_BITS);
                }
                bus.execute(&mut cmd)?;
                Ok(())
            })
            .inspect_err(|e| log::error!("read at 0x{:X} failed: {}", addr, e))?;

            addr += len as u64;
            rest = tail;
        }
        Ok(())
    }

    fn program(&self, data: &[u8], addr: u64) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let cached = ready(&inner.cache, inner.initialized)?;
        let negotiated = &cached.negotiated;
        check_range(negotiated, addr, data.len())?;

        let poll = self.poll();
        let page = u64::from(negotiated.page_size.max(1));
        let mut addr = addr;
        let mut rest = data;
        while !rest.is_empty() {
            let room = (page - addr % page) as usize;
            let (chunk, tail) = rest.split_at(rest.len().min(room));
            let wire = bank_address(&mut inner.bus, poll, negotiated, &mut inner.bank, addr)?;
            protocol::program_chunk(&mut inner.bus, poll, negotiated.program_inst, wire, chunk)
                .inspect_err(|e| log::error!("program at 0x{:X} failed: {}", addr, e))?;
            addr += chunk.len() as u64;
            rest = tail;
        }
        Ok(())
    }

    fn erase(&self, addr: u64, size: u64) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let cached = ready(&inner.cache, inner.initialized)?;
        let negotiated = &cached.negotiated;

        let poll = self.poll();
        log::debug!("erase 0x{:X}+0x{:X}", addr, size);
        for step in plan_erase(&cached.regions, addr, size)? {
            let step = step?;
            let inst = negotiated.erase_insts[step.slot];
            let wire = bank_address(&mut inner.bus, poll, negotiated, &mut inner.bank, step.addr)?;
            protocol::erase_unit(&mut inner.bus, poll, inst, wire)
                .inspect_err(|e| log::error!("erase at 0x{:X} failed: {}", step.addr, e))?;
        }
        Ok(())
    }

    fn erase_size(&self) -> u32 {
        self.lock()
            .ok()
            .and_then(|inner| inner.cache.as_ref().map(|c| c.regions.min_common_erase_size()))
            .unwrap_or(0)
    }

    fn erase_size_at(&self, addr: u64) -> u32 {
        self.lock()
            .ok()
            .and_then(|inner| inner.cache.as_ref().map(|c| c.regions.min_erase_size_at(addr)))
            .unwrap_or(0)
    }

    fn size(&self) -> u64 {
        self.lock()
            .ok()
            .and_then(|inner| inner.cache.as_ref().map(|c| c.negotiated.device_size))
            .unwrap_or(0)
    }

    fn device_type(&self) -> &'static str {
        DEVICE_TYPE
    }
}

impl<B: QspiBus> Drop for QspifBlockDevice<B> {
    fn drop(&mut self) {
        let inner = match self.inner.get_mut() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.initialized {
            log::warn!("{}: dropped while initialized, chip select stays claimed", self.csel);
        } else if inner.registered {
            self.registry.release(self.csel);
        }
    }
}

/// Proof of a successful [`QspifBlockDevice::acquire`]
///
/// Dropping the guard leaves the device initialized; only
/// [`release`](InitGuard::release) performs the matching deinit.
#[must_use = "the device stays initialized until `release` is called"]
pub struct InitGuard<'a, B: QspiBus> {
    device: &'a QspifBlockDevice<B>,
}

impl<'a, B: QspiBus> InitGuard<'a, B> {
    /// The guarded device
    pub fn device(&self) -> &'a QspifBlockDevice<B> {
        self.device
    }

    /// Undo the init this guard stands for
    pub fn release(self) -> Result<()> {
        self.device.deinit()
    }
}

impl<B: QspiBus> core::ops::Deref for InitGuard<'_, B> {
    type Target = QspifBlockDevice<B>;

    fn deref(&self) -> &Self::Target {
        self.device
    }
}
