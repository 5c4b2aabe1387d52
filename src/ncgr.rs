//! NCGR/NCBR tilesets.

use crate::{
    nom_fail, parse_file,
    tile::{Tile, TILE_PIXELS, TILE_SIZE},
    util::{self, ChunkHeader},
    value_error, NitroFile, ParseResult, Result,
};
use itertools::iproduct;
use nom::{
    bytes::complete::{tag, take},
    error::context,
    number::complete::{le_u16, le_u32},
};
use std::io::Write;

const RAHC_HEADER_LEN: usize = 0x20;
const SOPC_LEN: usize = 0x10;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BitDepth {
    #[default]
    Four,
    Eight,
}

impl BitDepth {
    #[inline]
    pub fn bits(self) -> u8 {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
        }
    }
    #[inline]
    pub fn tile_bytes(self) -> usize {
        match self {
            Self::Four => 0x20,
            Self::Eight => 0x40,
        }
    }
    #[inline]
    fn header_value(self) -> u32 {
        match self {
            Self::Four => 3,
            Self::Eight => 4,
        }
    }
    #[inline]
    fn from_header_value(v: u32) -> Self {
        match v {
            3 => Self::Four,
            _ => Self::Eight,
        }
    }
}

/// Where a tile was found in a tileset, and the flips that turn the stored
/// tile into the one searched for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TileMatch {
    pub index: usize,
    pub xflip: bool,
    pub yflip: bool,
}

#[derive(Clone, Debug)]
pub struct Ncgr {
    pub bpp: BitDepth,
    pub tiles: Vec<Tile>,
    /// In tiles. Only meaningful for NCBR layout and for drawing the tileset.
    pub width: u16,
    pub height: u16,
    /// Pixels are stored in canvas order instead of tile by tile.
    pub ncbr: bool,
    pub mapping: u32,
    /// Last word of the RAHC header, kept as read.
    pub unk: u32,
}

impl Default for Ncgr {
    fn default() -> Self {
        Self {
            bpp: BitDepth::Four,
            tiles: Vec::new(),
            width: 0,
            height: 0,
            ncbr: false,
            mapping: 0,
            unk: 0x18,
        }
    }
}

impl PartialEq for Ncgr {
    fn eq(&self, other: &Self) -> bool {
        self.bpp == other.bpp && self.ncbr == other.ncbr && self.tiles == other.tiles
    }
}

impl Eq for Ncgr {}

impl Ncgr {
    pub fn new(bpp: BitDepth) -> Self {
        Self {
            bpp,
            ..Default::default()
        }
    }
    /// Width and height in tiles, falling back to a single column when the
    /// stored dimensions don't cover every tile.
    pub fn dimensions(&self) -> (usize, usize) {
        let (w, h) = (self.width as usize, self.height as usize);
        if self.tiles.len() > w * h {
            (1, self.tiles.len())
        } else {
            (w, h)
        }
    }
    /// Sets the width in tiles and derives the height from the tile count.
    /// Returns whether the tiles fill the grid exactly.
    pub fn set_width(&mut self, width: u16) -> bool {
        self.width = width;
        self.height = match width {
            0 => 0,
            w => (self.tiles.len() / w as usize).try_into().unwrap_or(u16::MAX),
        };
        self.width as usize * self.height as usize == self.tiles.len()
    }
    pub fn find_tile(&self, tile: &Tile, flipping: bool) -> Option<TileMatch> {
        const FLIPS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];
        let flips = if flipping { &FLIPS[..] } else { &FLIPS[..1] };
        self.tiles.iter().enumerate().find_map(|(index, t)| {
            flips
                .iter()
                .find(|(xflip, yflip)| tile.matches_flipped(t, *xflip, *yflip))
                .map(|&(xflip, yflip)| TileMatch {
                    index,
                    xflip,
                    yflip,
                })
        })
    }
    /// Returns the existing tile matching `tile`, appending it if there is none.
    pub fn add_tile(&mut self, tile: Tile, flipping: bool) -> TileMatch {
        self.find_tile(&tile, flipping).unwrap_or_else(|| {
            self.tiles.push(tile);
            TileMatch {
                index: self.tiles.len() - 1,
                xflip: false,
                yflip: false,
            }
        })
    }

    fn canvas_pixels(&self, width: usize, height: usize) -> Vec<u8> {
        iproduct!(0..height * TILE_SIZE, 0..width * TILE_SIZE)
            .map(|(y, x)| {
                let tile = &self.tiles[(y / TILE_SIZE) * width + x / TILE_SIZE];
                tile.get_pixel(x % TILE_SIZE, y % TILE_SIZE)
            })
            .collect()
    }

    fn parse(data: &[u8]) -> ParseResult<'_, Self> {
        let (body, header) = ChunkHeader::parse(data, &[b"RGCN"])?;
        let (mut rest, ncgr) = context("RAHC", Self::parse_rahc)(body)?;
        let mut sections = 1;
        if rest.starts_with(b"SOPC") {
            (rest, _) = context("SOPC", Self::parse_sopc)(rest)?;
            sections += 1;
        }
        util::check_sections(data, &header, sections)?;
        Ok((rest, ncgr))
    }
    /// The SOPC values are derived from RAHC when packing, so they're skipped.
    fn parse_sopc(data: &[u8]) -> ParseResult<'_, ()> {
        let (rest, _) = tag(b"SOPC")(data)?;
        let (rest, size) = le_u32(rest)?;
        let len = (size as usize).checked_sub(8).ok_or_else(|| nom_fail(data))?;
        let (rest, _) = take(len)(rest)?;
        Ok((rest, ()))
    }
    fn parse_rahc(data: &[u8]) -> ParseResult<'_, Self> {
        let (data, _) = tag(b"RAHC")(data)?;
        let (data, _sect_size) = le_u32(data)?;
        let (data, mut height) = le_u16(data)?;
        let (data, mut width) = le_u16(data)?;
        let (data, depth) = le_u32(data)?;
        let (data, mapping) = le_u32(data)?;
        let (data, mode) = le_u32(data)?;
        let (data, data_len) = le_u32(data)?;
        let (data, unk) = le_u32(data)?;
        let (rest, raw) = take(data_len)(data)?;

        let bpp = BitDepth::from_header_value(depth);
        let bpt = bpp.tile_bytes();
        if data_len as usize != width as usize * height as usize * bpt {
            let tiles = data_len as usize / bpt;
            log::warn!(
                "NCGR dimensions {width}x{height} don't match {data_len} bytes of tile data, using 1x{tiles}"
            );
            width = 1;
            height = u16::try_from(tiles).map_err(|_| nom_fail(data))?;
        }
        let count = width as usize * height as usize;
        let ncbr = mode == 1;
        let pixels = unpack_pixels(&raw[..count * bpt], bpp);
        let tiles = if ncbr {
            let stride = width as usize * TILE_SIZE;
            iproduct!(0..height as usize, 0..width as usize)
                .map(|(ty, tx)| {
                    let mut tile = Tile::default();
                    for (py, px) in iproduct!(0..TILE_SIZE, 0..TILE_SIZE) {
                        let pos = (ty * TILE_SIZE + py) * stride + tx * TILE_SIZE + px;
                        tile.set_pixel(px, py, pixels[pos]);
                    }
                    tile
                })
                .collect()
        } else {
            pixels
                .chunks_exact(TILE_PIXELS)
                .filter_map(|c| Tile::try_from(c).ok())
                .collect()
        };
        log::debug!(
            "NCGR: {} tiles, {}bpp, {width}x{height}, ncbr {ncbr}",
            count,
            bpp.bits()
        );
        Ok((
            rest,
            Self {
                bpp,
                tiles,
                width,
                height,
                ncbr,
                mapping,
                unk,
            },
        ))
    }
}

fn pack_pixels(pixels: &[u8], bpp: BitDepth) -> Vec<u8> {
    match bpp {
        BitDepth::Four => pixels
            .chunks(2)
            .map(|p| p[0] | (p.get(1).copied().unwrap_or(0) << 4))
            .collect(),
        BitDepth::Eight => pixels.to_vec(),
    }
}

fn unpack_pixels(data: &[u8], bpp: BitDepth) -> Vec<u8> {
    match bpp {
        BitDepth::Four => data.iter().flat_map(|&b| [b & 0xf, b >> 4]).collect(),
        BitDepth::Eight => data.to_vec(),
    }
}

impl NitroFile for Ncgr {
    fn unpack(data: &[u8]) -> Result<Self> {
        parse_file("NCGR", data, Self::parse)
    }
    fn pack(&self) -> Result<Vec<u8>> {
        if self.bpp == BitDepth::Four {
            if let Some(i) = self.tiles.iter().position(|t| t.max_index() > 0xf) {
                return Err(value_error(format_args!(
                    "tile {i} uses palette index {} in a 4bpp tileset",
                    self.tiles[i].max_index()
                )));
            }
        }
        let (width, height) = self.dimensions();
        let pixels = if self.ncbr {
            if width * height != self.tiles.len() {
                return Err(value_error(format_args!(
                    "NCBR canvas of {width}x{height} tiles doesn't fit {} tiles",
                    self.tiles.len()
                )));
            }
            self.canvas_pixels(width, height)
        } else {
            self.tiles.iter().flat_map(|t| t.0).collect()
        };
        let width = u16::try_from(width).map_err(|_| value_error("tileset too wide"))?;
        let height = u16::try_from(height).map_err(|_| value_error("tileset too tall"))?;
        let tile_data = pack_pixels(&pixels, self.bpp);
        let sect_size = RAHC_HEADER_LEN + tile_data.len();
        let has_sopc = !self.ncbr;

        let body_len = sect_size + if has_sopc { SOPC_LEN } else { 0 };
        let mut w: Vec<u8> = Vec::with_capacity(ChunkHeader::LEN + body_len);
        ChunkHeader::new(b"RGCN", 0x0101, body_len, if has_sopc { 2 } else { 1 })?.write(&mut w)?;
        w.write_all(b"RAHC")?;
        w.write_all(&(sect_size as u32).to_le_bytes())?;
        w.write_all(&height.to_le_bytes())?;
        w.write_all(&width.to_le_bytes())?;
        w.write_all(&self.bpp.header_value().to_le_bytes())?;
        w.write_all(&self.mapping.to_le_bytes())?;
        w.write_all(&(self.ncbr as u32).to_le_bytes())?;
        w.write_all(&(tile_data.len() as u32).to_le_bytes())?;
        w.write_all(&self.unk.to_le_bytes())?;
        w.write_all(&tile_data)?;
        if has_sopc {
            w.write_all(b"SOPC")?;
            w.write_all(&(SOPC_LEN as u32).to_le_bytes())?;
            w.write_all(&0u32.to_le_bytes())?;
            w.write_all(&0x20u16.to_le_bytes())?;
            w.write_all(&height.to_le_bytes())?;
        }
        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn tile_from(f: impl Fn(usize) -> u8) -> Tile {
        let mut t = Tile::default();
        for (i, p) in t.0.iter_mut().enumerate() {
            *p = f(i);
        }
        t
    }

    const ONE_TILE_4BPP: [u8; 0x60] = hex!(
        "5247434e fffe 0101 60000000 1000 0200"
        "52414843 40000000 0100 0100 03000000 00000000 00000000 20000000 18000000"
        "1032547698badcfe 1032547698badcfe 1032547698badcfe 1032547698badcfe"
        "53 4f 50 43 10000000 00000000 2000 0100"
    );

    const ONE_TILE_8BPP: [u8; 0x80] = hex!(
        "5247434e fffe 0101 80000000 1000 0200"
        "52414843 60000000 0100 0100 04000000 00000000 00000000 40000000 18000000"
        "0001020304050607 08090a0b0c0d0e0f 1011121314151617 18191a1b1c1d1e1f"
        "2021222324252627 28292a2b2c2d2e2f 3031323334353637 38393a3b3c3d3e3f"
        "534f5043 10000000 00000000 2000 0100"
    );

    #[test]
    fn empty_roundtrip() {
        let x = Ncgr::default();
        let y = Ncgr::unpack(&x.pack().unwrap()).unwrap();
        assert_eq!(x, y);
        assert!(y.tiles.is_empty());
    }

    #[test]
    fn roundtrip_8bpp() {
        let mut x = Ncgr::new(BitDepth::Eight);
        x.tiles.push(tile_from(|i| i as u8));
        x.tiles.push(tile_from(|i| (i * 2) as u8));
        let y = Ncgr::unpack(&x.pack().unwrap()).unwrap();
        assert_eq!(x, y);
        assert_eq!(y.dimensions(), (1, 2));
    }

    #[test]
    fn roundtrip_4bpp() {
        let mut x = Ncgr::new(BitDepth::Four);
        x.tiles.push(tile_from(|i| i as u8 & 0xf));
        x.tiles.push(tile_from(|i| (i * 2) as u8 & 0xf));
        let y = Ncgr::unpack(&x.pack().unwrap()).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn linear_fixture_repacks_exactly() {
        let x = Ncgr::unpack(&ONE_TILE_4BPP).unwrap();
        assert_eq!(x.bpp, BitDepth::Four);
        assert!(!x.ncbr);
        assert_eq!((x.width, x.height), (1, 1));
        assert_eq!(x.tiles, vec![tile_from(|i| i as u8 & 0xf)]);
        assert_eq!(x.pack().unwrap(), ONE_TILE_4BPP);
    }

    #[test]
    fn linear_8bpp_fixture_repacks_exactly() {
        let x = Ncgr::unpack(&ONE_TILE_8BPP).unwrap();
        assert_eq!(x.bpp, BitDepth::Eight);
        assert_eq!((x.width, x.height, x.unk), (1, 1, 0x18));
        assert_eq!(x.tiles, vec![tile_from(|i| i as u8)]);
        assert_eq!(x.pack().unwrap(), ONE_TILE_8BPP);
    }

    #[test]
    fn cut_before_sopc_is_a_format_error() {
        let mut data = ONE_TILE_8BPP[..0x70].to_vec();
        let err = Ncgr::unpack(&data).unwrap_err();
        assert!(matches!(err, crate::Error::Format { format: "NCGR", .. }), "{err}");
        // a consistent size still leaves the declared SOPC section missing
        data[0x08] = 0x70;
        let err = Ncgr::unpack(&data).unwrap_err();
        assert!(matches!(err, crate::Error::Format { format: "NCGR", .. }), "{err}");
        data[0x0e] = 1;
        assert_eq!(Ncgr::unpack(&data).unwrap().tiles.len(), 1);
    }

    #[test]
    fn ncbr_is_canvas_ordered() {
        let mut x = Ncgr::new(BitDepth::Eight);
        x.ncbr = true;
        x.tiles.push(tile_from(|_| 1));
        x.tiles.push(tile_from(|_| 2));
        x.width = 2;
        x.height = 1;
        let packed = x.pack().unwrap();
        // no SOPC chunk: header + RAHC + 128 bytes of pixels
        assert_eq!(packed.len(), 0x10 + 0x20 + 0x80);
        assert_eq!(packed[0x0e], 1);
        let data = &packed[0x30..];
        assert_eq!(data[..8], [1; 8]);
        assert_eq!(data[8..16], [2; 8]);
        assert_eq!(data[16..24], [1; 8]);

        let y = Ncgr::unpack(&packed).unwrap();
        assert_eq!(x, y);
        assert_eq!((y.width, y.height), (2, 1));
        assert_eq!(y.pack().unwrap(), packed);
    }

    #[test]
    fn ncbr_4bpp_roundtrip() {
        let mut x = Ncgr::new(BitDepth::Four);
        x.ncbr = true;
        for n in 0..6u8 {
            x.tiles.push(tile_from(|i| (i as u8 + n) & 0xf));
        }
        x.width = 3;
        x.height = 2;
        let packed = x.pack().unwrap();
        let y = Ncgr::unpack(&packed).unwrap();
        assert_eq!(x, y);
        assert_eq!(y.pack().unwrap(), packed);
    }

    #[test]
    fn ncbr_rejects_unfilled_canvas() {
        let mut x = Ncgr::new(BitDepth::Eight);
        x.ncbr = true;
        x.tiles.push(Tile::default());
        x.width = 2;
        x.height = 2;
        assert!(matches!(x.pack(), Err(crate::Error::Value(_))));
    }

    #[test]
    fn rejects_wide_pixels_at_4bpp() {
        let mut x = Ncgr::new(BitDepth::Four);
        x.tiles.push(tile_from(|i| i as u8));
        assert!(matches!(x.pack(), Err(crate::Error::Value(_))));
    }

    #[test]
    fn stale_dimensions_are_recovered() {
        let mut data = ONE_TILE_4BPP;
        // claim 4x4 tiles with only one tile of data
        data[0x18] = 4;
        data[0x1a] = 4;
        let x = Ncgr::unpack(&data).unwrap();
        assert_eq!((x.width, x.height), (1, 1));
        assert_eq!(x.tiles.len(), 1);
    }

    #[test]
    fn truncated_tile_data_is_a_format_error() {
        let err = Ncgr::unpack(&ONE_TILE_4BPP[..0x40]).unwrap_err();
        assert!(matches!(err, crate::Error::Format { format: "NCGR", .. }), "{err}");
        assert!(Ncgr::unpack(b"RLCN").is_err());
    }

    #[test]
    fn find_tile_checks_flips_in_order() {
        let base = tile_from(|i| i as u8);
        let mut x = Ncgr::new(BitDepth::Eight);
        x.tiles.push(tile_from(|_| 9));
        x.tiles.push(base);
        let m = |index, xflip, yflip| Some(TileMatch { index, xflip, yflip });
        assert_eq!(x.find_tile(&base, true), m(1, false, false));
        assert_eq!(x.find_tile(&base.flipped(false, true), true), m(1, false, true));
        assert_eq!(x.find_tile(&base.flipped(true, false), true), m(1, true, false));
        assert_eq!(x.find_tile(&base.flipped(true, true), true), m(1, true, true));
        assert_eq!(x.find_tile(&base.flipped(true, true), false), None);
        assert_eq!(x.find_tile(&base, false), m(1, false, false));
        // symmetric tile: identity wins over every flip
        assert_eq!(x.find_tile(&tile_from(|_| 9), true), m(0, false, false));
    }

    #[test]
    fn add_tile_deduplicates() {
        let a = tile_from(|i| i as u8);
        let b = tile_from(|i| (i as u8) ^ 0x55);
        let mut x = Ncgr::new(BitDepth::Eight);
        assert_eq!(x.add_tile(a, true).index, 0);
        for (fx, fy) in [(true, false), (false, true), (true, true)] {
            x.add_tile(a.flipped(fx, fy), true);
        }
        assert_eq!(x.tiles.len(), 1);
        assert_eq!(x.add_tile(b, true).index, 1);
        assert_eq!(x.tiles, vec![a, b]);
        x.add_tile(a.flipped(true, false), false);
        assert_eq!(x.tiles.len(), 3);
    }

    #[test]
    fn set_width_reports_exact_fit() {
        let mut x = Ncgr::new(BitDepth::Eight);
        x.tiles = vec![Tile::default(); 6];
        assert!(x.set_width(3));
        assert_eq!(x.height, 2);
        assert!(!x.set_width(4));
        assert_eq!(x.height, 1);
    }
}
