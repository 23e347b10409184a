//! In-memory serial NOR flash

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use qspif_core::bus::{BusFeatures, QspiBus};
use qspif_core::error::BusError;
use qspif_core::spi::{opcodes, AddressWidth, BusFormat, BusWidth, IoMode, SpiCommand};

use crate::sfdp::SfdpBuilder;

/// Configuration byte address used by 65h/71h
const QPI_CR_ADDR: u32 = 0x80_0003;

/// Chip description and initial state
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// JEDEC ID returned by 9Fh
    pub jedec_id: [u8; 3],
    /// Geometry and SFDP image
    pub sfdp: SfdpBuilder,
    /// Formats the emulated controller can drive
    pub features: BusFeatures,
    /// Status reads reporting WIP after each program, erase or register write
    pub busy_polls: u32,
    /// Initial status/config registers (SR1 block protection bits included)
    pub status: [u8; 3],
    /// Start with the global block protection lock engaged
    pub global_protection: bool,
}

impl SimConfig {
    /// Chip with a generic Winbond-like ID
    pub fn new(sfdp: SfdpBuilder) -> Self {
        Self {
            jedec_id: [0xEF, 0x40, 0x18],
            sfdp,
            features: BusFeatures::empty(),
            busy_polls: 2,
            status: [0x1C, 0x00, 0x00],
            global_protection: false,
        }
    }

    /// Set the JEDEC ID
    pub fn jedec_id(mut self, id: [u8; 3]) -> Self {
        self.jedec_id = id;
        self
    }

    /// Set the controller features
    pub fn features(mut self, features: BusFeatures) -> Self {
        self.features = features;
        self
    }

    /// Set the initial status registers
    pub fn status(mut self, status: [u8; 3]) -> Self {
        self.status = status;
        self
    }

    /// Engage the global protection lock
    pub fn global_protection(mut self) -> Self {
        self.global_protection = true;
        self
    }
}

/// A command the emulated chip accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOp {
    /// Any command without a data array effect
    Command(u8),
    /// Array read
    Read {
        /// Opcode
        inst: u8,
        /// Effective address
        addr: u64,
        /// Length
        len: usize,
    },
    /// Page program
    Program {
        /// Opcode
        inst: u8,
        /// Effective address
        addr: u64,
        /// Length
        len: usize,
    },
    /// Erase
    Erase {
        /// Opcode
        inst: u8,
        /// Effective address
        addr: u64,
        /// Unit size
        size: u32,
    },
}

/// A protocol rule the driver broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A command other than RDSR while busy
    WhileBusy(u8),
    /// Program or erase without WEL
    WriteNotEnabled(u8),
    /// Program or erase on a protected array
    Protected(u8),
    /// Program crossing a page boundary
    PageWrap {
        /// Effective address
        addr: u64,
        /// Length
        len: usize,
    },
    /// Erase address not aligned to the unit
    MisalignedErase {
        /// Effective address
        addr: u64,
        /// Unit size
        size: u32,
    },
    /// Erase type not available in the region, or the unit crosses it
    RegionMismatch {
        /// Opcode
        inst: u8,
        /// Effective address
        addr: u64,
    },
    /// Transaction format does not match the command or the device mode
    WrongFormat(u8),
    /// Address byte count does not match the addressing mode
    AddressWidth(u8),
    /// Quad transfer with QE clear
    QuadDisabled(u8),
    /// Address beyond the array
    OutOfRange(u8),
    /// Opcode the chip does not implement
    UnknownOpcode(u8),
}

#[derive(Debug)]
struct Chip {
    config: SimConfig,
    image: Vec<u8>,
    data: Vec<u8>,
    /// `(opcode, size, slot, dedicated 4-byte)`
    erase_ops: Vec<(u8, u32, usize, bool)>,
    regions: Vec<(u64, u8)>,
    sr: [u8; 3],
    reg_3f: u8,
    wel: bool,
    busy: u32,
    format: BusFormat,
    frequency: u32,
    qpi: bool,
    opi: bool,
    addr4: bool,
    ear: u8,
    /// Non-volatile configuration register; bit 0 clear selects 4-byte addressing
    nvcr: [u8; 2],
    /// Volatile configuration byte at 800003h (65h/71h)
    vcr: u8,
    /// Volatile enhanced configuration register (65h/61h); bit 7 clear selects QPI
    vecr: u8,
    reset_enabled: bool,
    global_protect: bool,
    wel_stuck: bool,
    never_ready: bool,
    resets: u32,
    delays: u64,
    ops: Vec<SimOp>,
    violations: Vec<Violation>,
}

impl Chip {
    fn new(config: SimConfig) -> Self {
        let sfdp = &config.sfdp;
        let four_byte_erase = sfdp.four_byte_table.map(|(_, ops)| ops).unwrap_or([0; 4]);
        let mut erase_ops = Vec::new();
        for (slot, spec) in sfdp.erase_types.iter().enumerate() {
            if let Some(spec) = spec {
                erase_ops.push((spec.opcode, spec.size(), slot, false));
                let op4 = four_byte_erase[slot];
                if op4 != 0 && op4 != 0xFF {
                    erase_ops.push((op4, spec.size(), slot, true));
                }
            }
        }

        Self {
            image: sfdp.build(),
            data: vec![0xFF; sfdp.size() as usize],
            erase_ops,
            regions: sfdp.region_bounds(),
            sr: config.status,
            reg_3f: 0,
            wel: false,
            busy: 0,
            format: BusFormat::default(),
            frequency: 0,
            qpi: false,
            opi: false,
            addr4: sfdp.address_bytes == 0b10,
            ear: 0,
            nvcr: [0xFF, 0xFF],
            vcr: 0,
            vecr: 0xFF,
            reset_enabled: false,
            global_protect: config.global_protection,
            wel_stuck: false,
            never_ready: false,
            resets: 0,
            delays: 0,
            ops: Vec::new(),
            violations: Vec::new(),
            config,
        }
    }

    fn violation(&mut self, v: Violation) {
        log::debug!("sim: violation {:?}", v);
        self.violations.push(v);
    }

    fn reject(&mut self, v: Violation) -> BusError {
        self.violation(v);
        BusError::InvalidCommand
    }

    fn qe(&self) -> bool {
        match self.config.sfdp.qer {
            0 => true,
            2 => self.sr[0] & 0x40 != 0,
            3 => self.reg_3f & 0x80 != 0,
            _ => self.sr[1] & 0x02 != 0,
        }
    }

    fn status1(&mut self) -> u8 {
        let wip = if self.never_ready || self.busy > 0 {
            self.busy = self.busy.saturating_sub(1);
            opcodes::SR1_WIP
        } else {
            0
        };
        let wel = if self.wel { opcodes::SR1_WEL } else { 0 };
        (self.sr[0] & !0x03) | wip | wel
    }

    fn start_busy(&mut self) {
        self.wel = false;
        self.busy = self.config.busy_polls;
    }

    fn reset(&mut self) {
        log::trace!("sim: reset");
        self.qpi = false;
        self.opi = false;
        self.vcr = 0;
        self.vecr = 0xFF;
        self.addr4 = self.config.sfdp.address_bytes == 0b10 || self.nvcr[0] & 0x01 == 0;
        self.ear = 0;
        self.wel = false;
        self.busy = 0;
        self.resets += 1;
    }

    fn protected(&self) -> bool {
        self.global_protect || self.sr[0] & 0x3C != 0
    }

    /// Widths a command must arrive in
    fn expected_mode(&self, inst: u8) -> IoMode {
        if self.opi {
            return IoMode::Opi;
        }
        if self.qpi {
            return IoMode::Qpi;
        }
        match inst {
            opcodes::DOR | opcodes::DOR_4B => IoMode::DualOut,
            opcodes::DIOR | opcodes::DIOR_4B => IoMode::DualIo,
            opcodes::QOR | opcodes::QOR_4B => IoMode::QuadOut,
            opcodes::QIOR | opcodes::QIOR_4B => IoMode::QuadIo,
            _ => IoMode::Single,
        }
    }

    fn check_format(&mut self, inst: u8) -> Result<(), BusError> {
        let mode = self.expected_mode(inst);
        let f = self.format;
        if f.inst_width != mode.inst_width()
            || f.addr_width != mode.addr_width()
            || f.data_width != mode.data_width()
        {
            return Err(self.reject(Violation::WrongFormat(inst)));
        }
        if f.data_width == BusWidth::Quad && !self.qe() {
            return Err(self.reject(Violation::QuadDisabled(inst)));
        }
        Ok(())
    }

    /// Effective array address of an addressed command
    fn address(&mut self, cmd: &SpiCommand<'_>, dedicated: bool) -> Result<u64, BusError> {
        let inst = cmd.instruction;
        let expected = if dedicated || self.addr4 {
            AddressWidth::FourByte
        } else {
            AddressWidth::ThreeByte
        };
        if self.format.addr_size != expected {
            return Err(self.reject(Violation::AddressWidth(inst)));
        }
        let raw = cmd.address.unwrap_or(0) as u64;
        let addr = match expected {
            AddressWidth::FourByte => raw,
            _ => (self.ear as u64) << 24 | (raw & 0x00FF_FFFF),
        };
        if addr >= self.data.len() as u64 {
            return Err(self.reject(Violation::OutOfRange(inst)));
        }
        Ok(addr)
    }

    fn read_array(&mut self, cmd: &mut SpiCommand<'_>, dedicated: bool) -> Result<(), BusError> {
        let inst = cmd.instruction;
        self.check_format(inst)?;
        let addr = self.address(cmd, dedicated)?;
        let size = self.data.len() as u64;
        for (i, b) in cmd.read_buf.iter_mut().enumerate() {
            *b = self.data[((addr + i as u64) % size) as usize];
        }
        self.ops.push(SimOp::Read {
            inst,
            addr,
            len: cmd.read_buf.len(),
        });
        Ok(())
    }

    fn program(&mut self, cmd: &SpiCommand<'_>, dedicated: bool) -> Result<(), BusError> {
        let inst = cmd.instruction;
        self.check_format(inst)?;
        let addr = self.address(cmd, dedicated)?;
        if !self.wel {
            self.violation(Violation::WriteNotEnabled(inst));
            return Ok(());
        }
        if self.protected() {
            self.violation(Violation::Protected(inst));
            self.wel = false;
            return Ok(());
        }

        let page = self.config.sfdp.page_size() as u64;
        let len = cmd.write_data.len();
        if addr % page + len as u64 > page {
            self.violation(Violation::PageWrap { addr, len });
        }
        let base = addr - addr % page;
        for (i, &byte) in cmd.write_data.iter().enumerate() {
            let target = base + (addr % page + i as u64) % page;
            self.data[target as usize] &= byte;
        }
        self.ops.push(SimOp::Program { inst, addr, len });
        self.start_busy();
        Ok(())
    }

    fn erase(&mut self, cmd: &SpiCommand<'_>, size: u32, slot: usize, dedicated: bool) -> Result<(), BusError> {
        let inst = cmd.instruction;
        self.check_format(inst)?;
        let addr = self.address(cmd, dedicated)?;
        if !self.wel {
            self.violation(Violation::WriteNotEnabled(inst));
            return Ok(());
        }
        if self.protected() {
            self.violation(Violation::Protected(inst));
            self.wel = false;
            return Ok(());
        }

        let unit = size as u64;
        if addr % unit != 0 {
            self.violation(Violation::MisalignedErase { addr, size });
        }
        let start = addr - addr % unit;
        let end = (start + unit).min(self.data.len() as u64);

        let mut region_start = 0;
        for &(region_end, mask) in &self.regions {
            if start < region_end {
                if mask & (1 << slot) == 0 || end > region_end || start < region_start {
                    self.violations.push(Violation::RegionMismatch { inst, addr });
                }
                break;
            }
            region_start = region_end;
        }

        self.data[start as usize..end as usize].fill(0xFF);
        self.ops.push(SimOp::Erase {
            inst,
            addr: start,
            size,
        });
        self.start_busy();
        Ok(())
    }

    fn enter_qpi(&mut self, inst: u8) -> Result<(), BusError> {
        if !self.qe() {
            return Err(self.reject(Violation::QuadDisabled(inst)));
        }
        self.qpi = true;
        Ok(())
    }

    fn write_enabled_register(&mut self, inst: u8) -> bool {
        if !self.wel {
            self.violation(Violation::WriteNotEnabled(inst));
            return false;
        }
        true
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError> {
        let inst = cmd.instruction;
        log::trace!("sim: 0x{:02X} {:?}", inst, cmd.address);

        if inst != opcodes::RDSR && (self.busy > 0 || self.never_ready) {
            self.violation(Violation::WhileBusy(inst));
            return Ok(());
        }

        if let Some(&(_, size, slot, dedicated)) =
            self.erase_ops.iter().find(|(op, ..)| *op == inst)
        {
            return self.erase(cmd, size, slot, dedicated);
        }

        match inst {
            opcodes::READ | opcodes::FAST_READ | opcodes::DOR | opcodes::DIOR | opcodes::QOR
            | opcodes::QIOR => return self.read_array(cmd, false),
            opcodes::READ_4B
            | opcodes::FAST_READ_4B
            | opcodes::DOR_4B
            | opcodes::DIOR_4B
            | opcodes::QOR_4B
            | opcodes::QIOR_4B => return self.read_array(cmd, true),
            opcodes::PP => return self.program(cmd, false),
            opcodes::PP_4B => return self.program(cmd, true),
            _ if self.opi && Some(inst) == self.config.sfdp.opi.map(|o| o.opcode) => {
                return self.read_array(cmd, false)
            }
            _ => {}
        }

        // Register and control commands: everything on the instruction width
        // of the current mode
        let width = if self.opi {
            BusWidth::Octal
        } else if self.qpi {
            BusWidth::Quad
        } else {
            BusWidth::Single
        };
        if self.format.inst_width != width {
            return Err(self.reject(Violation::WrongFormat(inst)));
        }
        self.ops.push(SimOp::Command(inst));

        match inst {
            opcodes::RDID => {
                for (b, id) in cmd.read_buf.iter_mut().zip(self.config.jedec_id) {
                    *b = id;
                }
            }
            opcodes::RDSFDP => {
                if self.qpi || self.opi || self.format.dummy_cycles != opcodes::RDSFDP_DUMMY_CYCLES {
                    return Err(self.reject(Violation::WrongFormat(inst)));
                }
                let addr = cmd.address.unwrap_or(0) as usize;
                for (i, b) in cmd.read_buf.iter_mut().enumerate() {
                    *b = self.image.get(addr + i).copied().unwrap_or(0xFF);
                }
            }
            opcodes::RDSR => {
                if let Some(b) = cmd.read_buf.first_mut() {
                    *b = self.status1();
                }
            }
            // 35h without a data phase enters QPI
            opcodes::RDSR2 if cmd.read_buf.is_empty() => self.enter_qpi(inst)?,
            opcodes::RDSR2 => cmd.read_buf[0] = self.sr[1],
            opcodes::RDCR => {
                for (b, reg) in cmd.read_buf.iter_mut().zip(&self.sr[1..]) {
                    *b = *reg;
                }
            }
            opcodes::RDSR2_3F => cmd.read_buf[0] = self.reg_3f,
            opcodes::WREN => self.wel = !self.wel_stuck,
            opcodes::WRDI => self.wel = false,
            opcodes::WRSR => {
                if self.write_enabled_register(inst) {
                    for (i, &b) in cmd.write_data.iter().take(3).enumerate() {
                        self.sr[i] = if i == 0 { b & !0x03 } else { b };
                    }
                    self.start_busy();
                }
            }
            opcodes::WRSR2 => {
                if self.write_enabled_register(inst) {
                    self.sr[1] = cmd.write_data[0];
                    self.start_busy();
                }
            }
            opcodes::WRSR2_3E => {
                if self.write_enabled_register(inst) {
                    self.reg_3f = cmd.write_data[0];
                    self.start_busy();
                }
            }
            opcodes::ULBPR => {
                if self.write_enabled_register(inst) {
                    self.global_protect = false;
                    self.wel = false;
                }
            }
            opcodes::EN4B => self.addr4 = true,
            opcodes::WREAR => {
                if self.write_enabled_register(inst) {
                    self.ear = cmd.write_data[0];
                    self.wel = false;
                }
            }
            opcodes::RDEAR => cmd.read_buf[0] = self.ear,
            opcodes::BRRD => cmd.read_buf[0] = (if self.addr4 { 0x80 } else { 0 }) | self.ear,
            opcodes::BRWR => {
                let value = cmd.write_data[0];
                self.addr4 = value & 0x80 != 0;
                self.ear = value & 0x7F;
            }
            opcodes::RDNVCR => {
                for (b, reg) in cmd.read_buf.iter_mut().zip(self.nvcr) {
                    *b = reg;
                }
            }
            opcodes::WRNVCR => {
                if self.write_enabled_register(inst) {
                    for (reg, &b) in self.nvcr.iter_mut().zip(cmd.write_data) {
                        *reg = b;
                    }
                    // Takes effect at once on this part
                    self.addr4 = self.nvcr[0] & 0x01 == 0;
                    self.start_busy();
                }
            }
            opcodes::RDCR2 => {
                let value = match cmd.address {
                    Some(QPI_CR_ADDR) => self.vcr,
                    _ => self.vecr,
                };
                if let Some(b) = cmd.read_buf.first_mut() {
                    *b = value;
                }
            }
            opcodes::WRCR2_71 => {
                if self.write_enabled_register(inst) {
                    self.wel = false;
                    if cmd.address == Some(QPI_CR_ADDR) {
                        self.vcr = cmd.write_data[0];
                        if self.vcr & 0x40 != 0 {
                            self.enter_qpi(inst)?;
                        }
                    }
                }
            }
            opcodes::WRCR2_61 => {
                if self.write_enabled_register(inst) {
                    self.wel = false;
                    self.vecr = cmd.write_data[0];
                    if self.vecr & 0x80 == 0 {
                        self.enter_qpi(inst)?;
                    }
                }
            }
            opcodes::EOPI => {
                if self.write_enabled_register(inst) {
                    self.wel = false;
                    self.opi = true;
                }
            }
            opcodes::WRCR2_72 => {
                if self.write_enabled_register(inst) {
                    self.wel = false;
                    if cmd.address == Some(0) && cmd.write_data[0] & 0x03 == 0x01 {
                        self.opi = true;
                    }
                }
            }
            opcodes::EQIO => self.enter_qpi(inst)?,
            opcodes::SOFT_RESET => self.reset(),
            opcodes::RSTEN => {
                self.reset_enabled = true;
                return Ok(());
            }
            opcodes::RST if self.reset_enabled => self.reset(),
            _ => return Err(self.reject(Violation::UnknownOpcode(inst))),
        }
        self.reset_enabled = false;
        Ok(())
    }
}

/// Emulated flash chip and controller
///
/// Clones share the same chip, so a test can keep a handle for inspection
/// after handing one to the driver.
#[derive(Debug, Clone)]
pub struct SimFlash {
    chip: Arc<Mutex<Chip>>,
}

impl SimFlash {
    /// Create a chip in its power-on state
    pub fn new(config: SimConfig) -> Self {
        Self {
            chip: Arc::new(Mutex::new(Chip::new(config))),
        }
    }

    fn chip(&self) -> MutexGuard<'_, Chip> {
        self.chip.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the array
    pub fn data(&self) -> Vec<u8> {
        self.chip().data.clone()
    }

    /// Bytes `[addr, addr + len)` of the array
    pub fn slice(&self, addr: usize, len: usize) -> Vec<u8> {
        self.chip().data[addr..addr + len].to_vec()
    }

    /// Overwrite part of the array directly
    pub fn fill(&self, addr: usize, bytes: &[u8]) {
        self.chip().data[addr..addr + bytes.len()].copy_from_slice(bytes);
    }

    /// Commands accepted so far
    pub fn ops(&self) -> Vec<SimOp> {
        self.chip().ops.clone()
    }

    /// Erases accepted so far as `(opcode, address, size)`
    pub fn erases(&self) -> Vec<(u8, u64, u32)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SimOp::Erase { inst, addr, size } => Some((inst, addr, size)),
                _ => None,
            })
            .collect()
    }

    /// Number of accepted commands with `inst` and no array effect
    pub fn count(&self, inst: u8) -> usize {
        self.ops()
            .iter()
            .filter(|op| **op == SimOp::Command(inst))
            .count()
    }

    /// Forget the command log
    pub fn clear_ops(&self) {
        self.chip().ops.clear();
    }

    /// Rules broken so far
    pub fn violations(&self) -> Vec<Violation> {
        self.chip().violations.clone()
    }

    /// Status/config registers (WIP and WEL not included)
    pub fn status(&self) -> [u8; 3] {
        self.chip().sr
    }

    /// Whether the chip is in QPI mode
    pub fn is_qpi(&self) -> bool {
        self.chip().qpi
    }

    /// Whether the chip is in OPI mode
    pub fn is_opi(&self) -> bool {
        self.chip().opi
    }

    /// Non-volatile configuration register
    pub fn nvcr(&self) -> [u8; 2] {
        self.chip().nvcr
    }

    /// Whether the chip expects 4-byte addresses
    pub fn is_four_byte(&self) -> bool {
        self.chip().addr4
    }

    /// Extended address register
    pub fn ear(&self) -> u8 {
        self.chip().ear
    }

    /// Whether the global protection lock is engaged
    pub fn is_globally_protected(&self) -> bool {
        self.chip().global_protect
    }

    /// Number of soft resets performed
    pub fn resets(&self) -> u32 {
        self.chip().resets
    }

    /// Last clock frequency set
    pub fn frequency(&self) -> u32 {
        self.chip().frequency
    }

    /// Current transaction format
    pub fn format(&self) -> BusFormat {
        self.chip().format
    }

    /// Make WREN have no effect
    pub fn set_wel_stuck(&self, stuck: bool) {
        self.chip().wel_stuck = stuck;
    }

    /// Make the chip report busy forever
    pub fn set_never_ready(&self, never: bool) {
        self.chip().never_ready = never;
    }
}

impl QspiBus for SimFlash {
    fn features(&self) -> BusFeatures {
        self.chip().config.features
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), BusError> {
        if hz == 0 {
            return Err(BusError::Frequency(hz));
        }
        self.chip().frequency = hz;
        Ok(())
    }

    fn configure_format(&mut self, format: &BusFormat) -> Result<(), BusError> {
        let mut chip = self.chip();
        let features = chip.config.features;
        qspif_core::bus::check_format_supported(format, features)?;
        chip.format = *format;
        Ok(())
    }

    fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> Result<(), BusError> {
        self.chip().execute(cmd)
    }

    fn delay_us(&mut self, us: u32) {
        self.chip().delays += u64::from(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qspif_core::protocol::{self, ReadyPoll};

    const POLL: ReadyPoll = ReadyPoll {
        interval_us: 10,
        max_retries: 20,
    };

    fn flash() -> SimFlash {
        SimFlash::new(SimConfig::new(SfdpBuilder::uniform_16mib()).status([0; 3]))
    }

    #[test]
    fn test_jedec_id() {
        let mut flash = flash();
        assert_eq!(protocol::read_jedec_id(&mut flash).unwrap(), [0xEF, 0x40, 0x18]);
    }

    #[test]
    fn test_program_and_erase() {
        let mut flash = flash();
        protocol::program_chunk(&mut flash, POLL, opcodes::PP, 0x1000, &[0x12, 0x34]).unwrap();
        assert_eq!(flash.slice(0x1000, 3), [0x12, 0x34, 0xFF]);

        protocol::erase_unit(&mut flash, POLL, 0x20, 0x1000).unwrap();
        assert_eq!(flash.slice(0x1000, 2), [0xFF, 0xFF]);
        assert!(flash.violations().is_empty());
    }

    #[test]
    fn test_program_without_wren_is_ignored() {
        let mut flash = flash();
        let mut cmd = SpiCommand::write(opcodes::PP, 0, &[0x00]);
        flash.execute(&mut cmd).unwrap();
        assert_eq!(flash.slice(0, 1), [0xFF]);
        assert_eq!(flash.violations(), vec![Violation::WriteNotEnabled(opcodes::PP)]);
    }

    #[test]
    fn test_page_wrap() {
        let mut flash = flash();
        let data = [0u8; 4];
        protocol::program_chunk(&mut flash, POLL, opcodes::PP, 0xFE, &data).unwrap();
        assert_eq!(flash.slice(0, 2), [0x00, 0x00]);
        assert_eq!(flash.slice(0x100, 1), [0xFF]);
        assert_eq!(
            flash.violations(),
            vec![Violation::PageWrap { addr: 0xFE, len: 4 }]
        );
    }

    #[test]
    fn test_busy_rejects_commands() {
        let mut flash = flash();
        protocol::write_enable(&mut flash, POLL).unwrap();
        let mut cmd = SpiCommand::erase(0x20, 0);
        flash.execute(&mut cmd).unwrap();
        flash.execute(&mut SpiCommand::simple(opcodes::WREN)).unwrap();
        assert_eq!(flash.violations(), vec![Violation::WhileBusy(opcodes::WREN)]);
    }

    #[test]
    fn test_sfdp_needs_dummy_cycles() {
        let mut flash = flash();
        let mut buf = [0u8; 4];
        let mut cmd = SpiCommand::read(opcodes::RDSFDP, 0, &mut buf);
        assert!(flash.execute(&mut cmd).is_err());

        protocol::read_sfdp(&mut flash, &BusFormat::default(), 0, &mut buf).unwrap();
        assert_eq!(&buf, b"SFDP");
    }

    #[test]
    fn test_quad_read_needs_qe() {
        let mut flash = SimFlash::new(
            SimConfig::new(SfdpBuilder::uniform_16mib())
                .features(BusFeatures::QUAD)
                .status([0; 3]),
        );
        let format = BusFormat::for_mode(IoMode::QuadIo, AddressWidth::ThreeByte, 2, 4);
        flash.configure_format(&format).unwrap();
        let mut buf = [0u8; 4];
        let mut cmd = SpiCommand::read(opcodes::QIOR, 0, &mut buf);
        assert!(flash.execute(&mut cmd).is_err());
        assert_eq!(flash.violations(), vec![Violation::QuadDisabled(opcodes::QIOR)]);
    }
}
