//! SPI command structure and bus format

use super::{AddressWidth, BusWidth, IoMode};

/// Largest header `encode_header` can produce: instruction, 4 address
/// bytes, 4 alt bytes and 31 dummy cycles rounded up to whole bytes
pub const MAX_HEADER_LEN: usize = 1 + 4 + 4 + 4;

/// Transport configuration shared by every transaction until reconfigured
///
/// The transport holds exactly one format at a time. The driver keeps it at
/// the default (non-read) profile and only swaps in the read profile for the
/// duration of a single read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BusFormat {
    /// Instruction phase width
    pub inst_width: BusWidth,
    /// Address phase width
    pub addr_width: BusWidth,
    /// Number of address bytes
    pub addr_size: AddressWidth,
    /// Alt (mode bits) phase width
    pub alt_width: BusWidth,
    /// Number of alt bits, 0 for no alt phase
    pub alt_bits: u8,
    /// Data phase width
    pub data_width: BusWidth,
    /// Dummy clock cycles between address/alt and data
    pub dummy_cycles: u8,
}

impl BusFormat {
    /// 1-1-1 with the given address size and no dummy cycles
    pub const fn single(addr_size: AddressWidth) -> Self {
        Self {
            inst_width: BusWidth::Single,
            addr_width: BusWidth::Single,
            addr_size,
            alt_width: BusWidth::Single,
            alt_bits: 0,
            data_width: BusWidth::Single,
            dummy_cycles: 0,
        }
    }

    /// Format for a read in `mode`
    ///
    /// `mode_clocks` is converted to alt bits on the address lines.
    pub fn for_mode(mode: IoMode, addr_size: AddressWidth, mode_clocks: u8, dummy_cycles: u8) -> Self {
        let addr_width = mode.addr_width();
        Self {
            inst_width: mode.inst_width(),
            addr_width,
            addr_size,
            alt_width: addr_width,
            alt_bits: mode_clocks * addr_width.lines(),
            data_width: mode.data_width(),
            dummy_cycles,
        }
    }

    /// Format for every phase on `width` lines, used once the device has
    /// entered QPI or OPI
    pub const fn protocol(width: BusWidth, addr_size: AddressWidth) -> Self {
        Self {
            inst_width: width,
            addr_width: width,
            addr_size,
            alt_width: width,
            alt_bits: 0,
            data_width: width,
            dummy_cycles: 0,
        }
    }

    /// Set the dummy cycle count
    pub const fn with_dummy_cycles(mut self, cycles: u8) -> Self {
        self.dummy_cycles = cycles;
        self
    }

    /// Returns true if every phase uses a single line
    pub fn is_single_line(&self) -> bool {
        self.inst_width == BusWidth::Single
            && self.addr_width == BusWidth::Single
            && self.alt_width == BusWidth::Single
            && self.data_width == BusWidth::Single
    }
}

impl Default for BusFormat {
    fn default() -> Self {
        Self::single(AddressWidth::ThreeByte)
    }
}

/// A single flash transaction
///
/// Designed to avoid allocation - uses slices for data. Widths, address
/// size and dummy cycles come from the transport's current [`BusFormat`].
pub struct SpiCommand<'a> {
    /// The instruction byte
    pub instruction: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Alt/mode bits (if any), sent with the format's `alt_bits` width
    pub alt: Option<u32>,

    /// Data to write after instruction/address/dummy
    pub write_data: &'a [u8],

    /// Buffer to read into
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, WRDI)
    pub fn simple(instruction: u8) -> Self {
        Self {
            instruction,
            address: None,
            alt: None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(instruction: u8, buf: &'a mut [u8]) -> Self {
        Self {
            read_buf: buf,
            ..Self::simple(instruction)
        }
    }

    /// Create a write register command with no address (e.g., WRSR)
    pub fn write_reg(instruction: u8, data: &'a [u8]) -> Self {
        Self {
            write_data: data,
            ..Self::simple(instruction)
        }
    }

    /// Create an addressed read command
    pub fn read(instruction: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            address: Some(addr),
            read_buf: buf,
            ..Self::simple(instruction)
        }
    }

    /// Create an addressed write command (e.g., PP)
    pub fn write(instruction: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            address: Some(addr),
            write_data: data,
            ..Self::simple(instruction)
        }
    }

    /// Create an erase command
    pub fn erase(instruction: u8, addr: u32) -> Self {
        Self {
            address: Some(addr),
            ..Self::simple(instruction)
        }
    }

    /// Set the alt/mode bits
    pub fn with_alt(mut self, alt: u32) -> Self {
        self.alt = Some(alt);
        self
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Number of header bytes `encode_header` writes under `format`
    pub fn header_len(&self, format: &BusFormat) -> usize {
        let mut len = 1;
        if self.address.is_some() {
            len += format.addr_size.bytes();
        }
        if self.alt.is_some() {
            len += (format.alt_bits as usize).div_ceil(8);
        }
        len + (format.dummy_cycles as usize).div_ceil(8)
    }

    /// Assemble the command header for a byte-oriented 1-1-1 transport
    ///
    /// Writes the instruction, the big-endian address, the alt bytes and
    /// one zero byte per started group of eight dummy cycles into `buf`.
    /// Returns the number of bytes written.
    pub fn encode_header(&self, format: &BusFormat, buf: &mut [u8; MAX_HEADER_LEN]) -> usize {
        buf[0] = self.instruction;
        let mut len = 1;

        if let Some(addr) = self.address {
            len += format.addr_size.encode(addr, &mut buf[len..]);
        }

        if let Some(alt) = self.alt {
            let alt_bytes = (format.alt_bits as usize).div_ceil(8).min(4);
            let be = alt.to_be_bytes();
            buf[len..len + alt_bytes].copy_from_slice(&be[4 - alt_bytes..]);
            len += alt_bytes;
        }

        let dummy_bytes = (format.dummy_cycles as usize).div_ceil(8).min(4);
        buf[len..len + dummy_bytes].fill(0);
        len + dummy_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_erase_header() {
        let cmd = SpiCommand::erase(0xD8, 0x0012_3000);
        let mut buf = [0xAAu8; MAX_HEADER_LEN];
        let format = BusFormat::single(AddressWidth::ThreeByte);
        let len = cmd.encode_header(&format, &mut buf);
        assert_eq!(len, 4);
        assert_eq!(cmd.header_len(&format), 4);
        assert_eq!(&buf[..len], &[0xD8, 0x12, 0x30, 0x00]);
    }

    #[test]
    fn test_encode_sfdp_read_header() {
        let mut data = [0u8; 8];
        let cmd = SpiCommand::read(0x5A, 0x000010, &mut data);
        let format = BusFormat::single(AddressWidth::ThreeByte).with_dummy_cycles(8);
        let mut buf = [0xAAu8; MAX_HEADER_LEN];
        let len = cmd.encode_header(&format, &mut buf);
        assert_eq!(&buf[..len], &[0x5A, 0x00, 0x00, 0x10, 0x00]);
    }

    #[test]
    fn test_encode_four_byte_with_alt() {
        let mut data = [0u8; 4];
        let cmd = SpiCommand::read(0xEC, 0x0200_0000, &mut data).with_alt(0xA5);
        let format = BusFormat::for_mode(IoMode::QuadIo, AddressWidth::FourByte, 2, 4);
        assert_eq!(format.alt_bits, 8);
        let mut buf = [0u8; MAX_HEADER_LEN];
        let len = cmd.encode_header(&format, &mut buf);
        assert_eq!(&buf[..len], &[0xEC, 0x02, 0x00, 0x00, 0x00, 0xA5, 0x00]);
        assert_eq!(cmd.header_len(&format), len);
    }

    #[test]
    fn test_simple_command_has_no_phases() {
        let cmd = SpiCommand::simple(0x06);
        assert!(!cmd.has_address());
        assert!(!cmd.has_read());
        assert!(!cmd.has_write());
        assert_eq!(cmd.header_len(&BusFormat::default()), 1);
    }

    #[test]
    fn test_read_format_for_modes() {
        let format = BusFormat::for_mode(IoMode::QuadOut, AddressWidth::ThreeByte, 0, 8);
        assert_eq!(format.inst_width, BusWidth::Single);
        assert_eq!(format.addr_width, BusWidth::Single);
        assert_eq!(format.data_width, BusWidth::Quad);
        assert_eq!(format.alt_bits, 0);
        assert!(!format.is_single_line());

        let format = BusFormat::for_mode(IoMode::Single, AddressWidth::FourByte, 0, 0);
        assert!(format.is_single_line());
        assert_eq!(format.addr_size, AddressWidth::FourByte);
    }
}
