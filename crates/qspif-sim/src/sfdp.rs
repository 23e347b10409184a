//! SFDP image builder
//!
//! Produces the byte image a [`SimFlash`](crate::SimFlash) serves from
//! RDSFDP. Fields go where JESD216 puts them; anything not set stays zero.

use qspif_core::spi::IoMode;

/// One erase type slot: size exponent and opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EraseSpec {
    /// Size is `1 << size_exp` bytes
    pub size_exp: u8,
    /// 3-byte address opcode
    pub opcode: u8,
}

impl EraseSpec {
    /// Size in bytes
    pub fn size(&self) -> u32 {
        1 << self.size_exp
    }
}

/// One fast read entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadSpec {
    /// Bus widths
    pub mode: IoMode,
    /// Opcode
    pub opcode: u8,
    /// Mode clocks
    pub mode_clocks: u8,
    /// Dummy clocks
    pub dummy_clocks: u8,
}

/// 8-8-8 read advertised through the xSPI profile table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpiSpec {
    /// Read opcode
    pub opcode: u8,
    /// Dummy cycles (0 means the default of 20)
    pub dummy_clocks: u8,
    /// OPI enable bits (BFPT DWORD19 bits [8:4])
    pub enable: u8,
}

/// Description of a chip, rendered into an SFDP image by [`build`](Self::build)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfdpBuilder {
    pub(crate) signature: [u8; 4],
    pub(crate) major: u8,
    pub(crate) density: u64,
    pub(crate) address_bytes: u8,
    pub(crate) erase_types: [Option<EraseSpec>; 4],
    pub(crate) reads: Vec<ReadSpec>,
    pub(crate) page_size_exp: u8,
    pub(crate) qer: u8,
    pub(crate) qpi_enable: u8,
    pub(crate) soft_reset: u8,
    pub(crate) four_byte_methods: u8,
    pub(crate) basic_dwords: usize,
    pub(crate) sector_map: Option<Vec<(u64, u8)>>,
    pub(crate) four_byte_table: Option<(u32, [u8; 4])>,
    pub(crate) opi: Option<OpiSpec>,
}

impl SfdpBuilder {
    /// A chip of `density` bytes with 4K/32K/64K erase types, 256-byte
    /// pages, 66h/99h reset and only the 1-1-1 read
    pub fn new(density: u64) -> Self {
        Self {
            signature: *b"SFDP",
            major: 1,
            density,
            address_bytes: 0,
            erase_types: [
                Some(EraseSpec { size_exp: 12, opcode: 0x20 }),
                Some(EraseSpec { size_exp: 15, opcode: 0x52 }),
                Some(EraseSpec { size_exp: 16, opcode: 0xD8 }),
                None,
            ],
            reads: Vec::new(),
            page_size_exp: 8,
            qer: 0,
            qpi_enable: 0,
            soft_reset: 0x10,
            four_byte_methods: 0,
            basic_dwords: 16,
            sector_map: None,
            four_byte_table: None,
            opi: None,
        }
    }

    /// Winbond-style 16 MiB part: dual and quad reads, QE in SR2
    pub fn uniform_16mib() -> Self {
        Self::new(16 << 20)
            .read(IoMode::DualOut, 0x3B, 0, 8)
            .read(IoMode::DualIo, 0xBB, 4, 0)
            .read(IoMode::QuadOut, 0x6B, 0, 8)
            .read(IoMode::QuadIo, 0xEB, 2, 4)
            .quad_enable(4)
    }

    /// 32 MiB part with a 4K/32K boot region, a 4K/32K/64K main region and
    /// a 64K-only upper half, entering 4-byte mode with B7h
    pub fn three_region() -> Self {
        Self::uniform_16mib()
            .density(32 << 20)
            .address_bytes(0b01)
            .four_byte_methods(0x01)
            .sector_map(&[(0x1000, 0b0011), (0x00FF_F000, 0b0111), (0x0100_0000, 0b0100)])
    }

    /// Override the signature
    pub fn signature(mut self, signature: [u8; 4]) -> Self {
        self.signature = signature;
        self
    }

    /// Override the SFDP major revision
    pub fn major(mut self, major: u8) -> Self {
        self.major = major;
        self
    }

    /// Set the density in bytes
    pub fn density(mut self, density: u64) -> Self {
        self.density = density;
        self
    }

    /// DWORD1 bits [18:17]
    pub fn address_bytes(mut self, code: u8) -> Self {
        self.address_bytes = code & 0x03;
        self
    }

    /// Set erase type slot `slot` (0-based); `None` clears it
    pub fn erase_type(mut self, slot: usize, spec: Option<EraseSpec>) -> Self {
        self.erase_types[slot] = spec;
        self
    }

    /// Advertise a fast read
    pub fn read(mut self, mode: IoMode, opcode: u8, mode_clocks: u8, dummy_clocks: u8) -> Self {
        self.reads.retain(|r| r.mode != mode);
        self.reads.push(ReadSpec {
            mode,
            opcode,
            mode_clocks,
            dummy_clocks,
        });
        self
    }

    /// Page size exponent
    pub fn page_size_exp(mut self, exp: u8) -> Self {
        self.page_size_exp = exp;
        self
    }

    /// QER code (DWORD15 bits [22:20])
    pub fn quad_enable(mut self, qer: u8) -> Self {
        self.qer = qer & 0x07;
        self
    }

    /// QPI enable bits (DWORD15 bits [8:4])
    pub fn qpi_enable(mut self, bits: u8) -> Self {
        self.qpi_enable = bits & 0x1F;
        self
    }

    /// Soft reset bits (DWORD16 bits [13:8])
    pub fn soft_reset(mut self, bits: u8) -> Self {
        self.soft_reset = bits & 0x3F;
        self
    }

    /// 4-byte entry bits (DWORD16 bits [31:24])
    pub fn four_byte_methods(mut self, bits: u8) -> Self {
        self.four_byte_methods = bits;
        self
    }

    /// Number of basic table DWORDs emitted
    pub fn basic_dwords(mut self, count: usize) -> Self {
        self.basic_dwords = count.clamp(2, 20);
        self
    }

    /// Regions as `(size, erase type mask)` in address order
    pub fn sector_map(mut self, regions: &[(u64, u8)]) -> Self {
        self.sector_map = Some(regions.to_vec());
        self
    }

    /// 4-byte instruction table support bits and erase opcodes
    pub fn four_byte_table(mut self, support: u32, erase_opcodes: [u8; 4]) -> Self {
        self.four_byte_table = Some((support, erase_opcodes));
        self
    }

    /// Advertise an 8-8-8 read and its enable sequence
    ///
    /// Adds an xSPI profile table and extends the basic table to DWORD19.
    pub fn opi(mut self, opcode: u8, dummy_clocks: u8, enable: u8) -> Self {
        self.opi = Some(OpiSpec {
            opcode,
            dummy_clocks: dummy_clocks & 0x1F,
            enable: enable & 0x1F,
        });
        self
    }

    /// Device size in bytes
    pub fn size(&self) -> u64 {
        self.density
    }

    /// Page size in bytes
    pub fn page_size(&self) -> usize {
        1 << self.page_size_exp
    }

    /// `(end, mask)` per region, `end` exclusive
    pub(crate) fn region_bounds(&self) -> Vec<(u64, u8)> {
        match &self.sector_map {
            Some(regions) => {
                let mut end = 0;
                regions
                    .iter()
                    .map(|&(size, mask)| {
                        end += size;
                        (end, mask)
                    })
                    .collect()
            }
            None => {
                let mask = self
                    .erase_types
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.is_some())
                    .fold(0u8, |m, (i, _)| m | (1 << i));
                vec![(self.density, mask)]
            }
        }
    }

    fn spec(&self, mode: IoMode) -> Option<&ReadSpec> {
        self.reads.iter().find(|r| r.mode == mode)
    }

    fn half(&self, mode: IoMode) -> u32 {
        self.spec(mode).map_or(0, |r| {
            (r.opcode as u32) << 8 | ((r.mode_clocks as u32) & 0x07) << 5 | (r.dummy_clocks as u32 & 0x1F)
        })
    }

    fn basic_table(&self) -> Vec<u8> {
        let mut d = [0u32; 21];

        let four_k = self
            .erase_types
            .iter()
            .flatten()
            .find(|t| t.size_exp == 12);
        if let Some(t) = four_k {
            d[1] |= 0x01 | (t.opcode as u32) << 8;
        }
        d[1] |= (self.address_bytes as u32) << 17;
        for (mode, bit) in [
            (IoMode::DualOut, 16),
            (IoMode::DualIo, 20),
            (IoMode::QuadIo, 21),
            (IoMode::QuadOut, 22),
        ] {
            if self.spec(mode).is_some() {
                d[1] |= 1 << bit;
            }
        }

        let bits = self.density * 8;
        d[2] = if bits <= 1 << 31 {
            (bits - 1) as u32
        } else {
            (1 << 31) | bits.trailing_zeros()
        };

        d[3] = self.half(IoMode::QuadIo) | self.half(IoMode::QuadOut) << 16;
        d[4] = self.half(IoMode::DualOut) | self.half(IoMode::DualIo) << 16;
        if self.spec(IoMode::Dpi).is_some() {
            d[5] |= 1;
        }
        if self.spec(IoMode::Qpi).is_some() {
            d[5] |= 1 << 4;
        }
        d[6] = self.half(IoMode::Dpi) << 16;
        d[7] = self.half(IoMode::Qpi) << 16;

        for (i, t) in self.erase_types.iter().enumerate() {
            if let Some(t) = t {
                let shift = (i % 2) * 16;
                d[8 + i / 2] |= ((t.size_exp as u32) | (t.opcode as u32) << 8) << shift;
            }
        }

        d[11] = (self.page_size_exp as u32) << 4;
        d[15] = (self.qer as u32) << 20 | (self.qpi_enable as u32) << 4;
        d[16] = (self.four_byte_methods as u32) << 24 | (self.soft_reset as u32) << 8;

        let mut count = self.basic_dwords;
        if let Some(opi) = self.opi {
            d[19] = (opi.enable as u32) << 4;
            count = count.max(19);
        }

        d[1..=count]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    fn sector_map_table(regions: &[(u64, u8)]) -> Vec<u8> {
        let mut out = vec![0x03, 0x00, (regions.len() - 1) as u8, 0xFF];
        for &(size, mask) in regions {
            let raw = (((size / 256) - 1) as u32) << 8 | mask as u32;
            out.extend_from_slice(&raw.to_le_bytes());
        }
        out
    }

    /// Render the SFDP image
    pub fn build(&self) -> Vec<u8> {
        let mut tables: Vec<(u16, u8, Vec<u8>)> = vec![(0xFF00, 6, self.basic_table())];
        if let Some(regions) = &self.sector_map {
            tables.push((0xFF81, 0, Self::sector_map_table(regions)));
        }
        if let Some((support, erase)) = self.four_byte_table {
            let mut table = support.to_le_bytes().to_vec();
            table.extend_from_slice(&erase);
            tables.push((0xFF84, 0, table));
        }
        if let Some(opi) = self.opi {
            let mut dwords = [0u32; 4];
            dwords[0] = (opi.opcode as u32) << 8;
            dwords[3] = (opi.dummy_clocks as u32) << 27;
            tables.push((0xFF05, 0, dwords.iter().flat_map(|v| v.to_le_bytes()).collect()));
        }

        let mut image = Vec::new();
        image.extend_from_slice(&self.signature);
        image.extend_from_slice(&[6, self.major, (tables.len() - 1) as u8, 0xFF]);

        let mut pointer = 8 + 8 * tables.len();
        for (id, minor, table) in &tables {
            image.extend_from_slice(&[
                *id as u8,
                *minor,
                1,
                (table.len() / 4) as u8,
                pointer as u8,
                (pointer >> 8) as u8,
                (pointer >> 16) as u8,
                (*id >> 8) as u8,
            ]);
            pointer += table.len();
        }
        for (_, _, table) in tables {
            image.extend_from_slice(&table);
        }
        image
    }
}
