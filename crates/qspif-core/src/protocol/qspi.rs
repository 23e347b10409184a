//! Serial flash command sequences
//!
//! Every function here issues transactions in the transport's current
//! format unless it says otherwise. The caller owns the bus exclusively for
//! the duration of a sequence; the device mutex is what guarantees that the
//! write-enable, transfer and ready poll of one operation are never
//! interleaved with another.

use crate::bus::QspiBus;
use crate::error::{Error, Result};
use crate::sfdp::SoftResetMethod;
use crate::spi::{opcodes, AddressWidth, BusFormat, SpiCommand};

/// Bounded ready-poll parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyPoll {
    /// Delay before each status read
    pub interval_us: u32,
    /// Number of status reads before giving up
    pub max_retries: u32,
}

impl Default for ReadyPoll {
    fn default() -> Self {
        Self {
            interval_us: 1_000,
            max_retries: 10_000,
        }
    }
}

/// Read the JEDEC ID (manufacturer byte followed by two device bytes)
pub fn read_jedec_id<B: QspiBus + ?Sized>(bus: &mut B) -> Result<[u8; 3]> {
    let mut id = [0u8; 3];
    let mut cmd = SpiCommand::read_reg(opcodes::RDID, &mut id);
    bus.execute(&mut cmd)?;
    log::trace!("RDID -> {:02X?}", id);
    Ok(id)
}

/// Read the status register 1
pub fn read_status1<B: QspiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    read_register(bus, opcodes::RDSR)
}

/// Read a single-byte register with the given instruction
pub fn read_register<B: QspiBus + ?Sized>(bus: &mut B, instruction: u8) -> Result<u8> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(instruction, &mut buf);
    bus.execute(&mut cmd)?;
    Ok(buf[0])
}

/// Send the Write Disable command
pub fn write_disable<B: QspiBus + ?Sized>(bus: &mut B) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WRDI);
    bus.execute(&mut cmd)?;
    Ok(())
}

/// Wait for the WIP (Write In Progress) bit to clear
///
/// Sleeps `interval_us` before every status read and gives up with
/// [`Error::ReadyFailed`] after `max_retries` reads. A failed status read
/// is logged and counted as a busy reading.
pub fn wait_ready<B: QspiBus + ?Sized>(bus: &mut B, poll: ReadyPoll) -> Result<()> {
    for _ in 0..poll.max_retries {
        bus.delay_us(poll.interval_us);
        match read_status1(bus) {
            Ok(status) if status & opcodes::SR1_WIP == 0 => return Ok(()),
            Ok(_) => {}
            Err(e) => log::warn!("status read failed while polling: {}", e),
        }
    }

    log::error!("device still busy after {} polls", poll.max_retries);
    Err(Error::ReadyFailed)
}

/// Send Write Enable and confirm the latch
///
/// Returns [`Error::WrenFailed`] if WEL is not observed set once the
/// device reports ready.
pub fn write_enable<B: QspiBus + ?Sized>(bus: &mut B, poll: ReadyPoll) -> Result<()> {
    let mut cmd = SpiCommand::simple(opcodes::WREN);
    bus.execute(&mut cmd)?;
    wait_ready(bus, poll)?;

    let status = read_status1(bus)?;
    if status & opcodes::SR1_WEL == 0 {
        log::error!("write enable latch not set (SR1=0x{:02X})", status);
        return Err(Error::WrenFailed);
    }
    Ok(())
}

/// Run `f` with the transport switched to `format`, then restore `restore`
///
/// The restore is attempted even if `f` fails; the first error wins.
pub fn with_format<B, T, F>(bus: &mut B, format: &BusFormat, restore: &BusFormat, f: F) -> Result<T>
where
    B: QspiBus + ?Sized,
    F: FnOnce(&mut B) -> Result<T>,
{
    bus.configure_format(format)?;
    let result = f(bus);
    let restored = bus.configure_format(restore);
    let value = result?;
    restored?;
    Ok(value)
}

/// Format used by RDSFDP: 1-1-1, 3-byte address, 8 dummy cycles
pub const fn sfdp_format() -> BusFormat {
    BusFormat::single(AddressWidth::ThreeByte).with_dummy_cycles(opcodes::RDSFDP_DUMMY_CYCLES)
}

/// Read SFDP (Serial Flash Discoverable Parameters)
///
/// Brackets the transaction with the SFDP format and restores `restore`.
pub fn read_sfdp<B: QspiBus + ?Sized>(
    bus: &mut B,
    restore: &BusFormat,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    log::trace!("RDSFDP 0x{:06X} len {}", addr, buf.len());
    with_format(bus, &sfdp_format(), restore, |bus| {
        let mut cmd = SpiCommand::read(opcodes::RDSFDP, addr, buf);
        bus.execute(&mut cmd)?;
        Ok(())
    })
}

/// Send a software reset sequence
pub fn soft_reset<B: QspiBus + ?Sized>(bus: &mut B, method: SoftResetMethod) -> Result<()> {
    match method {
        SoftResetMethod::Direct => {
            log::debug!("soft reset via 0x{:02X}", opcodes::SOFT_RESET);
            bus.execute(&mut SpiCommand::simple(opcodes::SOFT_RESET))?;
        }
        SoftResetMethod::EnableAndReset => {
            log::debug!("soft reset via 0x{:02X}/0x{:02X}", opcodes::RSTEN, opcodes::RST);
            bus.execute(&mut SpiCommand::simple(opcodes::RSTEN))?;
            bus.execute(&mut SpiCommand::simple(opcodes::RST))?;
        }
    }
    // tRST
    bus.delay_us(100);
    Ok(())
}

/// Write register bytes with `instruction` under the write-enable handshake
pub fn write_registers<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    instruction: u8,
    values: &[u8],
) -> Result<()> {
    write_enable(bus, poll)?;
    log::trace!("write registers 0x{:02X} <- {:02X?}", instruction, values);
    let mut cmd = SpiCommand::write_reg(instruction, values);
    bus.execute(&mut cmd)?;
    wait_ready(bus, poll)
}

/// Erase one unit at `addr` and wait for completion
pub fn erase_unit<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    instruction: u8,
    addr: u32,
) -> Result<()> {
    write_enable(bus, poll)?;
    log::trace!("erase 0x{:02X} @ 0x{:08X}", instruction, addr);
    let mut cmd = SpiCommand::erase(instruction, addr);
    bus.execute(&mut cmd)?;
    wait_ready(bus, poll)
}

/// Program a chunk that does not cross a page boundary
pub fn program_chunk<B: QspiBus + ?Sized>(
    bus: &mut B,
    poll: ReadyPoll,
    instruction: u8,
    addr: u32,
    data: &[u8],
) -> Result<()> {
    write_enable(bus, poll)?;
    log::trace!("program 0x{:02X} @ 0x{:08X} len {}", instruction, addr, data.len());
    let mut cmd = SpiCommand::write(instruction, addr, data);
    bus.execute(&mut cmd)?;
    wait_ready(bus, poll)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::BusFeatures;
    use crate::error::BusError;
    use std::vec::Vec;

    /// Scripted transport: answers status reads from a queue and records
    /// every instruction it sees.
    #[derive(Default)]
    pub(crate) struct ScriptBus {
        pub status: Vec<u8>,
        pub log: Vec<u8>,
        pub formats: Vec<BusFormat>,
        pub delays: u32,
        pub fail_status_reads: u32,
    }

    impl QspiBus for ScriptBus {
        fn features(&self) -> BusFeatures {
            BusFeatures::empty()
        }

        fn set_frequency(&mut self, _hz: u32) -> core::result::Result<(), BusError> {
            Ok(())
        }

        fn configure_format(&mut self, format: &BusFormat) -> core::result::Result<(), BusError> {
            self.formats.push(*format);
            Ok(())
        }

        fn execute(&mut self, cmd: &mut SpiCommand<'_>) -> core::result::Result<(), BusError> {
            self.log.push(cmd.instruction);
            if cmd.instruction == opcodes::RDSR {
                if self.fail_status_reads > 0 {
                    self.fail_status_reads -= 1;
                    return Err(BusError::TransferFailed);
                }
                let value = if self.status.is_empty() {
                    0
                } else {
                    self.status.remove(0)
                };
                cmd.read_buf[0] = value;
            }
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {
            self.delays += 1;
        }
    }

    const FAST: ReadyPoll = ReadyPoll {
        interval_us: 1,
        max_retries: 5,
    };

    #[test]
    fn test_wait_ready_polls_until_idle() {
        let mut bus = ScriptBus {
            status: std::vec![0x01, 0x01, 0x00],
            ..Default::default()
        };
        assert_eq!(wait_ready(&mut bus, FAST), Ok(()));
        assert_eq!(bus.delays, 3);
    }

    #[test]
    fn test_wait_ready_gives_up() {
        let mut bus = ScriptBus {
            status: std::vec![0x01; 10],
            ..Default::default()
        };
        assert_eq!(wait_ready(&mut bus, FAST), Err(Error::ReadyFailed));
        assert_eq!(bus.delays, FAST.max_retries);
    }

    #[test]
    fn test_wait_ready_tolerates_failed_reads() {
        let mut bus = ScriptBus {
            fail_status_reads: 2,
            ..Default::default()
        };
        assert_eq!(wait_ready(&mut bus, FAST), Ok(()));
    }

    #[test]
    fn test_write_enable_checks_latch() {
        // ready, then WEL set
        let mut bus = ScriptBus {
            status: std::vec![0x00, 0x02],
            ..Default::default()
        };
        assert_eq!(write_enable(&mut bus, FAST), Ok(()));
        assert_eq!(bus.log, [opcodes::WREN, opcodes::RDSR, opcodes::RDSR]);

        let mut bus = ScriptBus {
            status: std::vec![0x00, 0x00],
            ..Default::default()
        };
        assert_eq!(write_enable(&mut bus, FAST), Err(Error::WrenFailed));
    }

    #[test]
    fn test_read_sfdp_restores_format() {
        let mut bus = ScriptBus::default();
        let restore = BusFormat::single(AddressWidth::FourByte);
        let mut buf = [0u8; 8];
        read_sfdp(&mut bus, &restore, 0, &mut buf).unwrap();
        assert_eq!(bus.formats, [sfdp_format(), restore]);
        assert_eq!(bus.log, [opcodes::RDSFDP]);
    }

    #[test]
    fn test_soft_reset_sequences() {
        let mut bus = ScriptBus::default();
        soft_reset(&mut bus, SoftResetMethod::EnableAndReset).unwrap();
        assert_eq!(bus.log, [0x66, 0x99]);

        let mut bus = ScriptBus::default();
        soft_reset(&mut bus, SoftResetMethod::Direct).unwrap();
        assert_eq!(bus.log, [0xF0]);
    }

    #[test]
    fn test_erase_unit_sequence() {
        let mut bus = ScriptBus {
            status: std::vec![0x00, 0x02, 0x00],
            ..Default::default()
        };
        erase_unit(&mut bus, FAST, 0x20, 0x1000).unwrap();
        assert_eq!(
            bus.log,
            [opcodes::WREN, opcodes::RDSR, opcodes::RDSR, 0x20, opcodes::RDSR]
        );
    }
}
