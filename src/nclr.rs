//! NCLR/NCPR palettes.

use crate::{
    parse_file,
    util::{color_to_rgb555, rgb555_to_color, ChunkHeader},
    value_error, NitroFile, ParseResult, Result,
};
use nom::{
    bytes::complete::tag,
    error::context,
    multi::count,
    number::complete::{le_u16, le_u32},
};
use rgb::RGB8;
use std::io::Write;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nclr {
    /// 8-bit channels; only the top 5 bits of each survive packing.
    pub colors: Vec<RGB8>,
    pub is8bpp: bool,
    /// Use the shorter NCPR header.
    pub ncpr: bool,
}

impl Default for Nclr {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Nclr {
    pub fn new(is8bpp: bool, ncpr: bool) -> Self {
        Self {
            colors: Vec::new(),
            is8bpp,
            ncpr,
        }
    }
    /// 256 shades of grey, for drawing graphics that have no palette.
    pub fn monochrome() -> Self {
        Self {
            colors: (0..=255u8)
                .map(|i| RGB8::new(i & 0xf8, i & 0xf8, i & 0xf8))
                .collect(),
            ..Default::default()
        }
    }
    #[inline]
    fn header_len(ncpr: bool) -> usize {
        if ncpr {
            0x10
        } else {
            0x18
        }
    }

    fn parse(data: &[u8]) -> ParseResult<'_, Self> {
        let (body, header) = ChunkHeader::parse(data, &[b"RLCN", b"RPCN"])?;
        let ncpr = &header.magic == b"RPCN";
        context("TTLP", move |d| Self::parse_ttlp(d, ncpr))(body)
    }
    fn parse_ttlp(data: &[u8], ncpr: bool) -> ParseResult<'_, Self> {
        let (rest, _) = tag(b"TTLP")(data)?;
        let (rest, ext_size) = le_u32(rest)?;
        let (rest, depth) = le_u16(rest)?;
        let (rest, _) = le_u16(rest)?;
        let (rest, _) = le_u32(rest)?;
        let (rest, mut size) = le_u32(rest)?;
        let (rest, _colors_offset) = le_u32(rest)?;
        if size == 0 || size > ext_size {
            let recovered = (ext_size as usize).saturating_sub(Self::header_len(ncpr)) as u32;
            log::warn!("NCLR declares {size} bytes of colors, using {recovered}");
            size = recovered;
        }
        let (rest, raw) = count(le_u16, size as usize / 2)(rest)?;
        Ok((
            rest,
            Self {
                colors: raw.into_iter().map(rgb555_to_color).collect(),
                is8bpp: depth == 4,
                ncpr,
            },
        ))
    }
}

impl NitroFile for Nclr {
    fn unpack(data: &[u8]) -> Result<Self> {
        parse_file("NCLR", data, Self::parse)
    }
    fn pack(&self) -> Result<Vec<u8>> {
        if self.colors.is_empty() {
            return Err(value_error("can't pack an empty palette"));
        }
        let size = self.colors.len() * 2;
        let ext_size = size + Self::header_len(self.ncpr);
        let magic = if self.ncpr { b"RPCN" } else { b"RLCN" };
        let depth = if self.is8bpp { 4u32 } else { 3 };

        let mut w: Vec<u8> = Vec::with_capacity(ChunkHeader::LEN + 0x18 + size);
        ChunkHeader::new(magic, 0x0100, ext_size, 1)?.write(&mut w)?;
        w.write_all(b"TTLP")?;
        w.write_all(&(ext_size as u32).to_le_bytes())?;
        w.write_all(&depth.to_le_bytes())?;
        w.write_all(&0u32.to_le_bytes())?;
        w.write_all(&(size as u32).to_le_bytes())?;
        w.write_all(&0x10u32.to_le_bytes())?;
        for &c in &self.colors {
            w.write_all(&color_to_rgb555(c).to_le_bytes())?;
        }
        Ok(w)
    }
}
