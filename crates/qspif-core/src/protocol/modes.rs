//! Status register handling and mode enables

use crate::bus::QspiBus;
use crate::error::{Error, Result};
use crate::quirks::{BlockProtection, FastMode, VendorQuirks};
use crate::sfdp::{FourByteEntry, OpiEnable, QpiEnable, QuadEnable};
use crate::spi::{opcodes, SpiCommand};

use super::qspi::{
    read_register, read_status1, wait_ready, write_enable, write_registers, ReadyPoll,
};

/// Address of the configuration byte used by the 65h/71h QPI sequence
const QPI_CR_ADDR: u32 = 0x80_0003;

/// Status and configuration registers written together with 01h
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegisters {
    /// Register values, SR1 first
    pub values: [u8; 3],
    /// Number of valid registers
    pub count: usize,
}

impl StatusRegisters {
    /// The valid registers
    pub fn as_slice(&self) -> &[u8] {
        &self.values[..self.count]
    }
}

/// Read SR1 and the registers after it
///
/// SR1 comes from 05h; the rest are read in one transaction with
/// `extra_read_inst` (35h by default, 15h on Macronix).
pub fn read_status_registers<B: QspiBus + ?Sized>(
    bus: &mut B,
    count: usize,
    extra_read_inst: u8,
) -> Result<StatusRegisters> {
    let count = count.clamp(1, 3);
    let mut values = [0u8; 3];
    values[0] = read_status1(bus)?;
    if count > 1 {
        let mut cmd = SpiCommand::read_reg(extra_read_inst, &mut values[1..count]);
        bus.execute(&mut cmd)?;
    }
    log::trace!("status registers {:02X?}", &values[..count]);
    Ok(StatusRegisters { values, count })
}

/// Write every register with a single 01h
pub fn write_status_registers<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    regs: &StatusRegisters,
) -> Result<()> {
    write_registers(bus, poll, opcodes::WRSR, regs.as_slice())
}

/// Remove factory block protection
///
/// With [`BlockProtection::StatusRegister`] every SR1 bit other than WIP,
/// WEL and (when it lives there) QE is cleared; the other registers are
/// written back unchanged.
pub fn clear_block_protection<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    quirks: &VendorQuirks,
    quad_enable: QuadEnable,
) -> Result<()> {
    match quirks.block_protection {
        BlockProtection::GlobalUnlock => {
            log::debug!("{}: global block protection unlock", quirks.name);
            write_enable(bus, poll)?;
            bus.execute(&mut SpiCommand::simple(opcodes::ULBPR))?;
            wait_ready(bus, poll)
        }
        BlockProtection::StatusRegister => {
            let mut regs =
                read_status_registers(bus, quirks.status_registers, quirks.status_read_inst)?;
            let mut keep = opcodes::SR1_WIP | opcodes::SR1_WEL;
            if quad_enable == QuadEnable::Sr1Bit6 {
                keep |= 0x40;
            }
            let cleared = regs.values[0] & keep;
            if cleared == regs.values[0] {
                return Ok(());
            }
            log::debug!(
                "clearing block protection (SR1 0x{:02X} -> 0x{:02X})",
                regs.values[0],
                cleared
            );
            regs.values[0] = cleared;
            write_status_registers(bus, poll, &regs)
        }
    }
}

/// Set the QE bit and verify it by reading it back
pub fn enable_quad<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    method: QuadEnable,
    quirks: &VendorQuirks,
) -> Result<()> {
    log::debug!("quad enable via {:?}", method);
    let set = match method {
        QuadEnable::None => return Ok(()),
        QuadEnable::Sr2Bit1WriteBoth => {
            let count = quirks.status_registers.max(2);
            let mut regs = read_status_registers(bus, count, quirks.status_read_inst)?;
            if regs.values[1] & 0x02 == 0 {
                regs.values[1] |= 0x02;
                write_status_registers(bus, poll, &regs)?;
            }
            read_register(bus, quirks.status_read_inst)? & 0x02 != 0
        }
        QuadEnable::Sr2Bit1Write31 => {
            let sr2 = read_register(bus, quirks.status_read_inst)?;
            if sr2 & 0x02 == 0 {
                write_registers(bus, poll, opcodes::WRSR2, &[sr2 | 0x02])?;
            }
            read_register(bus, quirks.status_read_inst)? & 0x02 != 0
        }
        QuadEnable::Sr1Bit6 => {
            let sr1 = read_status1(bus)?;
            if sr1 & 0x40 == 0 {
                write_registers(bus, poll, opcodes::WRSR, &[sr1 | 0x40])?;
            }
            read_status1(bus)? & 0x40 != 0
        }
        QuadEnable::Bit7Via3F => {
            let reg = read_register(bus, opcodes::RDSR2_3F)?;
            if reg & 0x80 == 0 {
                write_registers(bus, poll, opcodes::WRSR2_3E, &[reg | 0x80])?;
            }
            read_register(bus, opcodes::RDSR2_3F)? & 0x80 != 0
        }
    };

    if !set {
        log::error!("quad enable bit did not stick");
        return Err(Error::DeviceError);
    }
    Ok(())
}

/// Switch the device into QPI (4-4-4)
///
/// The device answers in QPI as soon as the sequence completes, so no ready
/// poll follows it here; the caller polls once the transport has switched.
pub fn enter_qpi<B: QspiBus + ?Sized>(bus: &mut B, poll: ReadyPoll, seq: QpiEnable) -> Result<()> {
    log::debug!("entering QPI via {:?}", seq);
    match seq {
        QpiEnable::Inst38 => bus.execute(&mut SpiCommand::simple(opcodes::EQIO))?,
        QpiEnable::Inst35 => bus.execute(&mut SpiCommand::simple(opcodes::EQIO_35))?,
        QpiEnable::SetBit6Via71 => {
            let mut cr = [0u8; 1];
            bus.execute(&mut SpiCommand::read(opcodes::RDCR2, QPI_CR_ADDR, &mut cr))?;
            write_mode_register(bus, poll, opcodes::WRCR2_71, Some(QPI_CR_ADDR), cr[0] | 0x40)?;
        }
        QpiEnable::ClearBit7Via61 => {
            let cr = read_register(bus, opcodes::RDCR2)?;
            write_mode_register(bus, poll, opcodes::WRCR2_61, None, cr & !0x80)?;
        }
    }
    Ok(())
}

/// Switch the device into OPI (8-8-8)
///
/// Like [`enter_qpi`], the ready poll is left to the caller.
pub fn enter_opi<B: QspiBus + ?Sized>(bus: &mut B, poll: ReadyPoll, seq: OpiEnable) -> Result<()> {
    log::debug!("entering OPI via {:?}", seq);
    match seq {
        OpiEnable::WrenE8 => {
            write_enable(bus, poll)?;
            bus.execute(&mut SpiCommand::simple(opcodes::EOPI))?;
        }
        OpiEnable::WrenWrite72 => {
            write_mode_register(bus, poll, opcodes::WRCR2_72, Some(0), 0x01)?;
        }
    }
    Ok(())
}

/// Write a register that changes the bus protocol, without the trailing poll
fn write_mode_register<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    instruction: u8,
    addr: Option<u32>,
    value: u8,
) -> Result<()> {
    write_enable(bus, poll)?;
    log::trace!("mode register 0x{:02X} <- 0x{:02X}", instruction, value);
    let data = [value];
    let mut cmd = match addr {
        Some(addr) => SpiCommand::write(instruction, addr, &data),
        None => SpiCommand::write_reg(instruction, &data),
    };
    bus.execute(&mut cmd)?;
    Ok(())
}

/// Set the vendor fast-mode bit and verify it by reading it back
pub fn enable_fast_mode<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    quirks: &VendorQuirks,
    fast: FastMode,
) -> Result<()> {
    let count = quirks.status_registers.max(fast.register + 1);
    let mut regs = read_status_registers(bus, count, quirks.status_read_inst)?;
    if regs.values[fast.register] & fast.mask != 0 {
        return Ok(());
    }

    log::debug!("{}: enabling fast mode", quirks.name);
    regs.values[fast.register] |= fast.mask;
    write_status_registers(bus, poll, &regs)?;

    let readback = read_status_registers(bus, count, quirks.status_read_inst)?;
    if readback.values[fast.register] & fast.mask == 0 {
        log::error!("{}: fast mode bit did not stick", quirks.name);
        return Err(Error::DeviceError);
    }
    Ok(())
}

/// Put the device in 4-byte address mode using `method`
///
/// Methods that keep 3-byte commands (extended address register, dedicated
/// instruction set) need no entry step.
pub fn enter_four_byte<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    method: FourByteEntry,
) -> Result<()> {
    match method {
        FourByteEntry::EnterB7 => {
            bus.execute(&mut SpiCommand::simple(opcodes::EN4B))?;
        }
        FourByteEntry::WrenEnterB7 => {
            write_enable(bus, poll)?;
            bus.execute(&mut SpiCommand::simple(opcodes::EN4B))?;
        }
        FourByteEntry::NvConfigRegister => {
            let mut nvcr = [0u8; 2];
            bus.execute(&mut SpiCommand::read_reg(opcodes::RDNVCR, &mut nvcr))?;
            if nvcr[0] & 0x01 != 0 {
                nvcr[0] &= !0x01;
                write_registers(bus, poll, opcodes::WRNVCR, &nvcr)?;
            }
        }
        FourByteEntry::BankRegister => {
            let bank = read_register(bus, opcodes::BRRD)?;
            bus.execute(&mut SpiCommand::write_reg(opcodes::BRWR, &[bank | 0x80]))?;
        }
        FourByteEntry::ExtAddrRegister => {
            select_bank(bus, poll, opcodes::WREAR, 0)?;
        }
        FourByteEntry::Always | FourByteEntry::DedicatedInstructions | FourByteEntry::Unsupported => {}
    }
    log::debug!("4-byte addressing via {:?}", method);
    Ok(())
}

/// Write the address MSB to the extended address register
pub fn select_bank<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    write_inst: u8,
    msb: u8,
) -> Result<()> {
    log::trace!("extended address register <- 0x{:02X}", msb);
    write_registers(bus, poll, write_inst, &[msb])
}
