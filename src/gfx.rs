//! Indexed-color rasters and their PNG encoding.

use crate::{value_error, Error, Result};
use rgb::{RGB8, RGBA8};

#[allow(clippy::upper_case_acronyms)]
pub type RGBA = RGBA8;

/// A palette-indexed image, one byte per pixel.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexedImage {
    pub width: usize,
    pub height: usize,
    /// Row-major palette indices.
    pub pixels: Vec<u8>,
    pub palette: Vec<RGB8>,
}

impl IndexedImage {
    pub fn new(width: usize, height: usize, palette: Vec<RGB8>) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            palette,
        }
    }
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[x + y * self.width]
    }
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, value: u8) {
        self.pixels[x + y * self.width] = value;
    }

    /// Decodes an indexed PNG of any bit depth, or an 8-bit greyscale one
    /// which gets a grey palette.
    pub fn read_png(data: &[u8]) -> Result<Self> {
        let mut decoder = lodepng::Decoder::new();
        decoder.color_convert(false);
        let png = decoder.decode(data)?;
        let info = decoder.info_png();
        let ct = info.color.colortype();
        let depth = info.color.bitdepth();
        match (png, ct) {
            (lodepng::Image::RawData(b), lodepng::ColorType::PALETTE) => {
                let palette = info
                    .color
                    .palette()
                    .iter()
                    .map(|c| RGB8::new(c.r, c.g, c.b))
                    .collect();
                Ok(Self {
                    pixels: unpack_indices(&b.buffer, depth as usize, b.width * b.height),
                    width: b.width,
                    height: b.height,
                    palette,
                })
            }
            (lodepng::Image::Grey(b), _) => Ok(Self {
                width: b.width,
                height: b.height,
                pixels: bytemuck::allocation::cast_vec(b.buffer),
                palette: (0..=255u8).map(|i| RGB8::new(i, i, i)).collect(),
            }),
            _ => Err(value_error(format_args!(
                "PNG must be indexed color or 8-bit greyscale, found {ct:?} at {depth} bits"
            ))),
        }
    }
    /// Encodes as an 8-bit indexed PNG with an opaque palette.
    pub fn write_png(&self) -> Result<Vec<u8>> {
        if self.palette.is_empty() || self.palette.len() > 256 {
            return Err(value_error(format_args!(
                "PNG palette must have 1 to 256 colors, found {}",
                self.palette.len()
            )));
        }
        if self.pixels.len() != self.width * self.height {
            return Err(value_error("pixel buffer doesn't match the image size"));
        }
        let palette: Vec<RGBA> = self
            .palette
            .iter()
            .map(|c| RGBA::new(c.r, c.g, c.b, 255))
            .collect();
        let mut encoder = lodepng::Encoder::new();
        encoder.set_auto_convert(false);
        encoder.set_palette(&palette)?;
        encoder
            .info_raw_mut()
            .set_colortype(lodepng::ColorType::PALETTE);
        encoder.info_raw_mut().set_bitdepth(8);
        encoder
            .info_png_mut()
            .color
            .set_colortype(lodepng::ColorType::PALETTE);
        encoder.info_png_mut().color.set_bitdepth(8);
        encoder
            .encode(&self.pixels, self.width, self.height)
            .map_err(Error::from)
    }
}

/// Expands a big-endian bitstream of `depth`-bit indices, one byte each.
fn unpack_indices(raw: &[u8], depth: usize, count: usize) -> Vec<u8> {
    if depth >= 8 {
        return raw.iter().copied().take(count).collect();
    }
    let per_byte = 8 / depth;
    let mask = (1u8 << depth) - 1;
    raw.iter()
        .flat_map(|&b| (0..per_byte).map(move |i| (b >> (8 - depth * (i + 1))) & mask))
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> IndexedImage {
        let mut img = IndexedImage::new(
            16,
            8,
            vec![RGB8::new(0, 0, 0), RGB8::new(255, 0, 0), RGB8::new(0, 40, 248)],
        );
        for y in 0..8 {
            for x in 0..16 {
                img.set_pixel(x, y, ((x / 4 + y) % 3) as u8);
            }
        }
        img
    }

    #[test]
    fn png_roundtrip() {
        let img = checker();
        let png = img.write_png().unwrap();
        let back = IndexedImage::read_png(&png).unwrap();
        assert_eq!(back, img);
    }

    #[test]
    fn sub_byte_indices() {
        assert_eq!(unpack_indices(&[0b1011_0001], 4, 2), [0xb, 0x1]);
        assert_eq!(unpack_indices(&[0b1011_0001], 2, 4), [2, 3, 0, 1]);
        assert_eq!(unpack_indices(&[0b1000_0001, 0xff], 1, 9), [1, 0, 0, 0, 0, 0, 0, 1, 1]);
    }

    #[test]
    fn empty_palette_is_rejected() {
        let img = IndexedImage::new(8, 8, Vec::new());
        assert!(matches!(img.write_png(), Err(Error::Value(_))));
    }

    #[test]
    fn garbage_is_a_png_error() {
        assert!(matches!(IndexedImage::read_png(b"not a png"), Err(Error::Png(_))));
    }
}
