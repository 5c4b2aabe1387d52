//! Conversions between indexed rasters, binary graphics and text palettes.

use crate::{
    gfx::IndexedImage,
    ncgr::BitDepth,
    nscr::MapEntry,
    tile::{Tile, TILE_SIZE},
    value_error, Ncgr, Nclr, Nscr, Result,
};
use itertools::iproduct;
use rgb::RGB8;

/// Highest tile index a tilemap entry can hold.
const MAX_TILE_INDEX: usize = 0x3ff;

fn check_tile_aligned(img: &IndexedImage) -> Result<(usize, usize)> {
    if img.width == 0
        || img.height == 0
        || img.width % TILE_SIZE != 0
        || img.height % TILE_SIZE != 0
    {
        return Err(value_error(format_args!(
            "image size {}x{} isn't a multiple of {TILE_SIZE}",
            img.width, img.height
        )));
    }
    if img.width > u16::MAX as usize || img.height > u16::MAX as usize {
        return Err(value_error(format_args!(
            "image size {}x{} is too large",
            img.width, img.height
        )));
    }
    Ok((img.width / TILE_SIZE, img.height / TILE_SIZE))
}

fn read_tile(img: &IndexedImage, tx: usize, ty: usize) -> Tile {
    let mut tile = Tile::default();
    for (y, x) in iproduct!(0..TILE_SIZE, 0..TILE_SIZE) {
        tile.set_pixel(x, y, img.get_pixel(tx * TILE_SIZE + x, ty * TILE_SIZE + y));
    }
    tile
}

fn draw_tile(img: &mut IndexedImage, tile: &Tile, tx: usize, ty: usize, bank: u8) {
    for (y, x) in iproduct!(0..TILE_SIZE, 0..TILE_SIZE) {
        let value = tile.get_pixel(x, y) | bank;
        img.set_pixel(tx * TILE_SIZE + x, ty * TILE_SIZE + y, value);
    }
}

/// The raster's palette as an NCLR. More than 16 colors makes it 8 bpp.
pub fn raster_to_palette(img: &IndexedImage) -> Nclr {
    Nclr {
        colors: img.palette.clone(),
        is8bpp: img.palette.len() > 16,
        ncpr: false,
    }
}

/// Splits a raster into an 8 bpp tileset, a tilemap and a palette. Tiles
/// that repeat, flipped or not, are stored once.
pub fn raster_to_triple(img: &IndexedImage) -> Result<(Ncgr, Nscr, Nclr)> {
    let (width, height) = check_tile_aligned(img)?;
    let mut ncgr = Ncgr::new(BitDepth::Eight);
    let mut nscr = Nscr::new(img.width as u16, img.height as u16);
    nscr.color_mode = 1;
    for (ty, tx) in iproduct!(0..height, 0..width) {
        let m = ncgr.add_tile(read_tile(img, tx, ty), true);
        if m.index > MAX_TILE_INDEX {
            return Err(value_error(format_args!(
                "image needs more than {} unique tiles",
                MAX_TILE_INDEX + 1
            )));
        }
        let entry = MapEntry {
            tile: m.index as u16,
            pal: 0,
            xflip: m.xflip,
            yflip: m.yflip,
        };
        nscr.set_entry(tx, ty, entry)?;
    }
    ncgr.set_width(1);
    log::debug!(
        "{}x{} raster: {} tiles for {} map entries",
        img.width,
        img.height,
        ncgr.tiles.len(),
        nscr.map.len()
    );
    let mut nclr = raster_to_palette(img);
    nclr.is8bpp = true;
    Ok((ncgr, nscr, nclr))
}

/// Draws a tilemap. For 4 bpp tiles the entry's palette bank selects the
/// upper bits of each index.
pub fn triple_to_raster(ncgr: &Ncgr, nscr: &Nscr, nclr: &Nclr) -> Result<IndexedImage> {
    let (width, height) = nscr.tile_dimensions();
    let mut img = IndexedImage::new(
        width * TILE_SIZE,
        height * TILE_SIZE,
        nclr.colors.clone(),
    );
    for (ty, tx) in iproduct!(0..height, 0..width) {
        let entry = nscr.get_entry(tx, ty)?;
        let tile = ncgr.tiles.get(entry.tile as usize).ok_or_else(|| {
            value_error(format_args!(
                "tilemap entry ({tx}, {ty}) uses tile {} but the tileset has {}",
                entry.tile,
                ncgr.tiles.len()
            ))
        })?;
        let bank = match ncgr.bpp {
            BitDepth::Four => entry.pal << 4,
            BitDepth::Eight => 0,
        };
        draw_tile(&mut img, &tile.flipped(entry.xflip, entry.yflip), tx, ty, bank);
    }
    Ok(img)
}

/// Cuts a raster into tiles in row-major order, without deduplication.
pub fn raster_to_tileset(img: &IndexedImage, bpp: BitDepth) -> Result<Ncgr> {
    let (width, height) = check_tile_aligned(img)?;
    if bpp == BitDepth::Four {
        if let Some(p) = img.pixels.iter().find(|&&p| p > 0xf) {
            return Err(value_error(format_args!(
                "palette index {p} doesn't fit in a 4 bpp tile"
            )));
        }
    }
    let mut ncgr = Ncgr::new(bpp);
    ncgr.tiles = iproduct!(0..height, 0..width)
        .map(|(ty, tx)| read_tile(img, tx, ty))
        .collect();
    ncgr.width = width as u16;
    ncgr.height = height as u16;
    Ok(ncgr)
}

/// Lays out every tile on the tileset's grid.
pub fn tileset_to_raster(ncgr: &Ncgr, nclr: &Nclr) -> IndexedImage {
    let (width, height) = ncgr.dimensions();
    let mut img = IndexedImage::new(
        width * TILE_SIZE,
        height * TILE_SIZE,
        nclr.colors.clone(),
    );
    for (i, tile) in ncgr.tiles.iter().enumerate().take(width * height) {
        draw_tile(&mut img, tile, i % width, i / width, 0);
    }
    img
}

/// Serializes a palette as a JASC-PAL text file.
pub fn write_jasc(nclr: &Nclr) -> String {
    let mut out = format!("JASC-PAL\r\n0100\r\n{}\r\n", nclr.colors.len());
    for c in &nclr.colors {
        out.push_str(&format!("{} {} {}\r\n", c.r, c.g, c.b));
    }
    out
}

/// Parses a JASC-PAL text file. Color components may be separated by spaces
/// or commas.
pub fn read_jasc(text: &str) -> Result<Nclr> {
    let mut lines = text.lines().map(str::trim);
    if lines.next() != Some("JASC-PAL") {
        return Err(value_error("not a JASC-PAL palette"));
    }
    if lines.next() != Some("0100") {
        return Err(value_error("unsupported JASC-PAL version"));
    }
    let count: usize = lines
        .next()
        .and_then(|l| l.parse().ok())
        .ok_or_else(|| value_error("JASC-PAL color count is missing"))?;
    let colors = lines
        .filter(|l| !l.is_empty())
        .take(count)
        .map(parse_jasc_color)
        .collect::<Result<Vec<_>>>()?;
    if colors.len() != count {
        return Err(value_error(format_args!(
            "JASC-PAL declares {count} colors but has {}",
            colors.len()
        )));
    }
    Ok(Nclr {
        is8bpp: count > 16,
        colors,
        ncpr: false,
    })
}

fn parse_jasc_color(line: &str) -> Result<RGB8> {
    let rgb = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| value_error(format_args!("bad JASC-PAL color `{line}`: {e}")))?;
    match rgb[..] {
        [r, g, b] => Ok(RGB8::new(r, g, b)),
        _ => Err(value_error(format_args!("bad JASC-PAL color `{line}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Vec<RGB8> {
        vec![
            RGB8::new(0, 0, 0),
            RGB8::new(255, 0, 0),
            RGB8::new(0, 255, 0),
            RGB8::new(17, 34, 51),
        ]
    }

    /// Quadrants built from one pattern, mirrored around both axes.
    fn mirrored() -> IndexedImage {
        let mut img = IndexedImage::new(16, 16, palette());
        for (y, x) in iproduct!(0..8, 0..8) {
            let p = ((x + 2 * y) % 4) as u8;
            img.set_pixel(x, y, p);
            img.set_pixel(15 - x, y, p);
            img.set_pixel(x, 15 - y, p);
            img.set_pixel(15 - x, 15 - y, p);
        }
        img
    }

    #[test]
    fn flipped_tiles_are_shared() {
        let (ncgr, nscr, nclr) = raster_to_triple(&mirrored()).unwrap();
        assert_eq!(ncgr.tiles.len(), 1);
        assert_eq!(ncgr.bpp, BitDepth::Eight);
        assert_eq!(ncgr.dimensions(), (1, 1));
        assert_eq!(nclr.colors[1], RGB8::new(255, 0, 0));
        let flips: Vec<_> = nscr.map.iter().map(|e| (e.tile, e.xflip, e.yflip)).collect();
        assert_eq!(
            flips,
            [(0, false, false), (0, true, false), (0, false, true), (0, true, true)]
        );
        assert_eq!(triple_to_raster(&ncgr, &nscr, &nclr).unwrap(), mirrored());
    }

    #[test]
    fn unaligned_raster_is_rejected() {
        let img = IndexedImage::new(12, 8, palette());
        assert!(matches!(raster_to_triple(&img), Err(crate::Error::Value(_))));
        assert!(raster_to_tileset(&img, BitDepth::Eight).is_err());
    }

    #[test]
    fn missing_tile_is_rejected() {
        let (mut ncgr, nscr, nclr) = raster_to_triple(&mirrored()).unwrap();
        ncgr.tiles.clear();
        assert!(matches!(
            triple_to_raster(&ncgr, &nscr, &nclr),
            Err(crate::Error::Value(_))
        ));
    }

    #[test]
    fn four_bpp_banks_select_palette_rows() {
        let mut ncgr = Ncgr::new(BitDepth::Four);
        let mut tile = Tile::default();
        tile.set_pixel(0, 0, 3);
        ncgr.tiles.push(tile);
        let mut nscr = Nscr::new(8, 8);
        nscr.map[0].pal = 2;
        let img = triple_to_raster(&ncgr, &nscr, &Nclr::monochrome()).unwrap();
        assert_eq!(img.get_pixel(0, 0), 0x23);
        assert_eq!(img.get_pixel(1, 0), 0x20);
    }

    #[test]
    fn tileset_roundtrip() {
        let (ncgr, _, nclr) = raster_to_triple(&mirrored()).unwrap();
        let img = tileset_to_raster(&ncgr, &nclr);
        assert_eq!((img.width, img.height), (8, 8));
        assert_eq!(raster_to_tileset(&img, BitDepth::Eight).unwrap(), ncgr);
    }

    #[test]
    fn tileset_keeps_duplicates_in_order() {
        let ncgr = raster_to_tileset(&mirrored(), BitDepth::Four).unwrap();
        assert_eq!(ncgr.tiles.len(), 4);
        assert_eq!((ncgr.width, ncgr.height), (2, 2));
        assert_eq!(ncgr.tiles[1], ncgr.tiles[0].flipped(true, false));
        let mut img = mirrored();
        img.set_pixel(3, 3, 16);
        assert!(raster_to_tileset(&img, BitDepth::Four).is_err());
    }

    #[test]
    fn jasc_roundtrip() {
        let nclr = raster_to_palette(&mirrored());
        let text = write_jasc(&nclr);
        assert!(text.starts_with("JASC-PAL\r\n0100\r\n4\r\n0 0 0\r\n255 0 0\r\n"));
        assert_eq!(read_jasc(&text).unwrap(), nclr);
    }

    #[test]
    fn jasc_accepts_commas() {
        let nclr = read_jasc("JASC-PAL\n0100\n2\n1,2,3\n4, 5, 6\n").unwrap();
        assert_eq!(nclr.colors, [RGB8::new(1, 2, 3), RGB8::new(4, 5, 6)]);
        assert!(!nclr.is8bpp);
        assert!(read_jasc("JASC-PAL\n0100\n2\n1 2 3\n").is_err());
        assert!(read_jasc("JASC-PAL\n0100\n1\n1 2\n").is_err());
        assert!(read_jasc("RIFF").is_err());
    }
}
