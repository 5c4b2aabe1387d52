pub const TILE_SIZE: usize = 8;
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

/// An 8x8 block of palette indices, stored row by row.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Tile(pub [u8; TILE_PIXELS]);

impl Default for Tile {
    fn default() -> Self {
        Self([0; TILE_PIXELS])
    }
}

impl Tile {
    #[inline]
    pub fn get_pixel(&self, x: usize, y: usize) -> u8 {
        self.0[x + y * TILE_SIZE]
    }
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, value: u8) {
        self.0[x + y * TILE_SIZE] = value;
    }
    #[inline]
    pub fn pixels(&self) -> &[u8; TILE_PIXELS] {
        &self.0
    }
    pub fn flipped(&self, xflip: bool, yflip: bool) -> Self {
        if !xflip && !yflip {
            return *self;
        }
        let mut out = Self::default();
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                out.set_pixel(x, y, self.get_pixel(flip(x, xflip), flip(y, yflip)));
            }
        }
        out
    }
    /// Same as `*self == other.flipped(xflip, yflip)` without building the
    /// flipped tile.
    pub fn matches_flipped(&self, other: &Self, xflip: bool, yflip: bool) -> bool {
        (0..TILE_SIZE).all(|y| {
            (0..TILE_SIZE)
                .all(|x| self.get_pixel(x, y) == other.get_pixel(flip(x, xflip), flip(y, yflip)))
        })
    }
    /// Highest palette index used in the tile.
    #[inline]
    pub fn max_index(&self) -> u8 {
        self.0.iter().copied().max().unwrap_or(0)
    }
}

#[inline]
fn flip(i: usize, flip: bool) -> usize {
    if flip {
        TILE_SIZE - 1 - i
    } else {
        i
    }
}

impl From<[u8; TILE_PIXELS]> for Tile {
    #[inline]
    fn from(value: [u8; TILE_PIXELS]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Tile {
    type Error = std::array::TryFromSliceError;

    #[inline]
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        <[u8; TILE_PIXELS]>::try_from(value).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(mask: u8) -> Tile {
        let mut t = Tile::default();
        for (i, p) in t.0.iter_mut().enumerate() {
            *p = i as u8 & mask;
        }
        t
    }

    #[test]
    fn flips_remap_pixels() {
        let t = ramp(0xff);
        assert_eq!(t.flipped(false, false), t);
        assert_eq!(t.flipped(true, false).get_pixel(0, 0), t.get_pixel(7, 0));
        assert_eq!(t.flipped(false, true).get_pixel(0, 0), t.get_pixel(0, 7));
        assert_eq!(t.flipped(true, true).get_pixel(0, 0), 63);
        assert_eq!(t.flipped(true, true).get_pixel(2, 5), t.get_pixel(5, 2));
    }

    #[test]
    fn flips_are_involutions() {
        let t = ramp(0xf);
        for (fx, fy) in [(false, false), (true, false), (false, true), (true, true)] {
            assert_eq!(t.flipped(fx, fy).flipped(fx, fy), t);
        }
    }

    #[test]
    fn matches_flipped_agrees_with_flipped() {
        let t = ramp(0xff);
        for (fx, fy) in [(false, false), (true, false), (false, true), (true, true)] {
            let f = t.flipped(fx, fy);
            assert!(f.matches_flipped(&t, fx, fy));
            assert!(t.matches_flipped(&f, fx, fy));
        }
        assert!(!t.matches_flipped(&t, true, false));
    }
}
