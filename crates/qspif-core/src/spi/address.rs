//! Address width types

/// Number of bytes in the address phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// 3-byte (24-bit) address - supports up to 16 MiB
    #[default]
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> usize {
        match self {
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Encode an address big-endian into `buf`, returning the bytes written
    ///
    /// Only the low `bytes()` bytes of `address` are sent; the caller is
    /// responsible for having selected a width that reaches it.
    pub fn encode(&self, address: u32, buf: &mut [u8]) -> usize {
        let be = address.to_be_bytes();
        let n = self.bytes();
        buf[..n].copy_from_slice(&be[4 - n..]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_big_endian() {
        let mut buf = [0u8; 4];
        assert_eq!(AddressWidth::ThreeByte.encode(0x0012_3456, &mut buf), 3);
        assert_eq!(&buf[..3], &[0x12, 0x34, 0x56]);

        assert_eq!(AddressWidth::FourByte.encode(0x89AB_CDEF, &mut buf), 4);
        assert_eq!(buf, [0x89, 0xAB, 0xCD, 0xEF]);
    }

    #[test]
    fn test_three_byte_drops_msb() {
        let mut buf = [0u8; 3];
        AddressWidth::ThreeByte.encode(0x0100_0010, &mut buf);
        assert_eq!(buf, [0x00, 0x00, 0x10]);
    }
}
