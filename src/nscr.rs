//! NSCR tilemaps.

use crate::{
    nom_fail, parse_file, tile::TILE_PIXELS, util::ChunkHeader, value_error, Error, NitroFile,
    ParseResult, Result,
};
use nom::{
    bytes::complete::tag,
    error::context,
    multi::count,
    number::complete::{le_u16, le_u32},
};
use std::io::Write;

const NRCS_HEADER_LEN: usize = 0x14;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct MapEntry {
    /// 10 bits.
    pub tile: u16,
    /// 4 bits.
    pub pal: u8,
    pub xflip: bool,
    pub yflip: bool,
}

impl MapEntry {
    #[inline]
    pub fn new(tile: u16) -> Self {
        Self {
            tile,
            ..Default::default()
        }
    }
    #[inline]
    pub fn to_u16(self) -> u16 {
        (self.tile & 0x3ff)
            | ((self.xflip as u16) << 10)
            | ((self.yflip as u16) << 11)
            | (((self.pal & 0xf) as u16) << 12)
    }
    #[inline]
    pub fn from_u16(raw: u16) -> Self {
        Self {
            tile: raw & 0x3ff,
            pal: (raw >> 12) as u8 & 0xf,
            xflip: (raw >> 10) & 1 == 1,
            yflip: (raw >> 11) & 1 == 1,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nscr {
    /// In pixels.
    pub width: u16,
    pub height: u16,
    /// Nonzero for 8bpp maps. Only stored in the header.
    pub color_mode: u32,
    /// Row-major, one entry per 8x8 tile.
    pub map: Vec<MapEntry>,
}

impl Nscr {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            color_mode: 0,
            map: vec![MapEntry::default(); width as usize * height as usize / TILE_PIXELS],
        }
    }
    #[inline]
    pub fn is8bpp(&self) -> bool {
        self.color_mode != 0
    }
    /// Width and height in tiles.
    #[inline]
    pub fn tile_dimensions(&self) -> (usize, usize) {
        (self.width as usize / 8, self.height as usize / 8)
    }
    fn index(&self, x: usize, y: usize) -> Result<usize> {
        let (width, height) = self.tile_dimensions();
        let index = y * width + x;
        if x >= width || y >= height || index >= self.map.len() {
            return Err(Error::OutOfBounds {
                x,
                y,
                width,
                height,
            });
        }
        Ok(index)
    }
    /// `x` and `y` are tile coordinates.
    pub fn get_entry(&self, x: usize, y: usize) -> Result<MapEntry> {
        Ok(self.map[self.index(x, y)?])
    }
    pub fn set_entry(&mut self, x: usize, y: usize, entry: MapEntry) -> Result<()> {
        let index = self.index(x, y)?;
        self.map[index] = entry;
        Ok(())
    }

    fn parse(data: &[u8]) -> ParseResult<'_, Self> {
        let (body, _) = ChunkHeader::parse(data, &[b"RCSN"])?;
        context("NRCS", Self::parse_nrcs)(body)
    }
    fn parse_nrcs(data: &[u8]) -> ParseResult<'_, Self> {
        let (rest, _) = tag(b"NRCS")(data)?;
        let (rest, _size) = le_u32(rest)?;
        let (rest, width) = le_u16(rest)?;
        let (rest, height) = le_u16(rest)?;
        let (rest, color_mode) = le_u32(rest)?;
        let (rest, map_size) = le_u32(rest)?;
        let entries = map_size as usize / 2;
        if entries != width as usize * height as usize / TILE_PIXELS {
            return Err(nom_fail(data));
        }
        let (rest, raw) = count(le_u16, entries)(rest)?;
        Ok((
            rest,
            Self {
                width,
                height,
                color_mode,
                map: raw.into_iter().map(MapEntry::from_u16).collect(),
            },
        ))
    }
}

impl NitroFile for Nscr {
    fn unpack(data: &[u8]) -> Result<Self> {
        parse_file("NSCR", data, Self::parse)
    }
    fn pack(&self) -> Result<Vec<u8>> {
        let expected = self.width as usize * self.height as usize / TILE_PIXELS;
        if self.map.len() != expected {
            return Err(value_error(format_args!(
                "{}x{} tilemap has {} entries, expected {expected}",
                self.width,
                self.height,
                self.map.len()
            )));
        }
        let map_size = self.map.len() * 2;
        let size = map_size + NRCS_HEADER_LEN;
        let mut w: Vec<u8> = Vec::with_capacity(ChunkHeader::LEN + size);
        ChunkHeader::new(b"RCSN", 0x0100, size, 1)?.write(&mut w)?;
        w.write_all(b"NRCS")?;
        w.write_all(&(size as u32).to_le_bytes())?;
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.color_mode.to_le_bytes())?;
        w.write_all(&(map_size as u32).to_le_bytes())?;
        for entry in &self.map {
            w.write_all(&entry.to_u16().to_le_bytes())?;
        }
        Ok(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn entry_bit_layout() {
        let e = MapEntry {
            tile: 0x2ab,
            pal: 0xc,
            xflip: true,
            yflip: false,
        };
        assert_eq!(e.to_u16(), 0xc6ab);
        assert_eq!(MapEntry::from_u16(0xc6ab), e);
        assert_eq!(MapEntry::from_u16(0x0800).yflip, true);
        // out of range fields are masked
        assert_eq!(MapEntry { tile: 0x7ff, pal: 0x1f, ..e }.to_u16(), 0xf7ff);
    }

    #[test]
    fn new_fills_grid() {
        let x = Nscr::new(256, 128);
        assert_eq!(x.width, 256);
        assert_eq!(x.height, 128);
        assert_eq!(x.map.len(), 512);
    }

    #[test]
    fn roundtrip_preserves_edits() {
        let mut x = Nscr::new(256, 128);
        x.set_entry(2, 5, MapEntry::new(43)).unwrap();
        let y = Nscr::unpack(&x.pack().unwrap()).unwrap();
        assert_eq!(x, y);
        assert_eq!(y.get_entry(2, 5).unwrap(), MapEntry::new(43));
        assert_eq!(y.map[5 * 32 + 2].tile, 43);
    }

    #[test]
    fn exact_layout() {
        let mut x = Nscr::new(16, 8);
        x.color_mode = 1;
        x.set_entry(1, 0, MapEntry::from_u16(0x1c02)).unwrap();
        let packed = x.pack().unwrap();
        assert_eq!(
            packed,
            hex!(
                "5243534e fffe 0001 28000000 1000 0100"
                "4e524353 18000000 1000 0800 01000000 04000000"
                "0000 021c"
            )
        );
        assert_eq!(Nscr::unpack(&packed).unwrap().pack().unwrap(), packed);
    }

    #[test]
    fn entry_access_is_bounds_checked() {
        let mut x = Nscr::new(16, 16);
        assert!(x.get_entry(1, 1).is_ok());
        assert!(matches!(x.get_entry(2, 0), Err(Error::OutOfBounds { .. })));
        assert!(matches!(x.set_entry(0, 2, MapEntry::default()), Err(Error::OutOfBounds { .. })));
    }

    #[test]
    fn pack_rejects_wrong_entry_count() {
        let mut x = Nscr::new(16, 16);
        x.map.pop();
        assert!(matches!(x.pack(), Err(Error::Value(_))));
    }

    #[test]
    fn cut_tilemap_is_a_format_error() {
        let packed = Nscr::new(16, 8).pack().unwrap();
        let err = Nscr::unpack(&packed[..packed.len() - 2]).unwrap_err();
        assert!(matches!(err, Error::Format { format: "NSCR", .. }), "{err}");
    }

    #[test]
    fn unpack_rejects_inconsistent_size() {
        let mut packed = Nscr::new(16, 8).pack().unwrap();
        packed[0x18] = 32;
        assert!(matches!(Nscr::unpack(&packed), Err(Error::Format { .. })));
    }
}
