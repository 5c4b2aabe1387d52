//! NCER cell banks: sprites made of one or more hardware OAM entries.

use crate::{
    nom_fail, parse_file,
    util::{self, ChunkHeader},
    value_error, NitroFile, ParseResult, Result,
};
use nom::{
    bytes::complete::{tag, take},
    error::context,
    multi::count,
    number::complete::{le_i16, le_u16, le_u32},
};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::io::Write;

const KBEC_HEADER_LEN: usize = 0x20;
const OAM_LEN: usize = 6;

/// `(width, height)` in pixels, indexed by `[shape][size]`.
const SHAPE_SIZE_TO_DIM: [[(u32, u32); 4]; 3] = [
    [(8, 8), (16, 16), (32, 32), (64, 64)],
    [(16, 8), (32, 8), (32, 16), (64, 32)],
    [(8, 16), (8, 32), (16, 32), (32, 64)],
];

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum ColorDepth {
    #[default]
    Colors16 = 16,
    Colors256 = 256,
}

/// A hardware sprite object. Fields hold the raw, masked attribute values.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Oam {
    // attribute 0
    pub y: u8,
    pub rot: bool,
    pub size_disable: bool,
    pub mode: u8,
    pub mosaic: bool,
    pub colors: ColorDepth,
    pub shape: u8,
    // attribute 1
    /// 9 bits, wraps around like the hardware does.
    pub x: u16,
    pub rotsca: u8,
    pub size: u8,
    // attribute 2
    pub char_name: u16,
    pub prio: u8,
    pub pal: u8,
}

impl Oam {
    /// Size in pixels for the OAM's shape and size values.
    pub fn get_size(&self) -> Result<(u32, u32)> {
        SHAPE_SIZE_TO_DIM
            .get(self.shape as usize)
            .and_then(|sizes| sizes.get(self.size as usize))
            .copied()
            .ok_or_else(|| {
                value_error(format_args!(
                    "OAM has invalid shape/size: {} {}",
                    self.shape, self.size
                ))
            })
    }
    /// Picks the shape and size values for a hardware supported pixel size.
    pub fn set_size(&mut self, dim: (u32, u32)) -> Result<()> {
        for (shape, sizes) in SHAPE_SIZE_TO_DIM.iter().enumerate() {
            if let Some(size) = sizes.iter().position(|&d| d == dim) {
                self.shape = shape as u8;
                self.size = size as u8;
                return Ok(());
            }
        }
        Err(value_error(format_args!("invalid OAM size: {}x{}", dim.0, dim.1)))
    }
    /// Sign-extended screen position.
    #[inline]
    pub fn position(&self) -> (i32, i32) {
        let x = ((self.x & 0x1ff) as i32 ^ 0x100) - 0x100;
        (x, self.y as i8 as i32)
    }
    pub fn to_words(&self) -> [u16; 3] {
        let attr0 = self.y as u16
            | (self.rot as u16) << 8
            | (self.size_disable as u16) << 9
            | ((self.mode & 3) as u16) << 10
            | (self.mosaic as u16) << 12
            | ((self.colors == ColorDepth::Colors256) as u16) << 13
            | ((self.shape & 3) as u16) << 14;
        let attr1 =
            (self.x & 0x1ff) | ((self.rotsca & 0x1f) as u16) << 9 | ((self.size & 3) as u16) << 14;
        let attr2 = (self.char_name & 0x3ff)
            | ((self.prio & 3) as u16) << 10
            | ((self.pal & 0xf) as u16) << 12;
        [attr0, attr1, attr2]
    }
    pub fn from_words([attr0, attr1, attr2]: [u16; 3]) -> Self {
        Self {
            y: (attr0 & 0xff) as u8,
            rot: attr0 & 0x100 != 0,
            size_disable: attr0 & 0x200 != 0,
            mode: ((attr0 >> 10) & 3) as u8,
            mosaic: attr0 & 0x1000 != 0,
            colors: if attr0 & 0x2000 != 0 {
                ColorDepth::Colors256
            } else {
                ColorDepth::Colors16
            },
            shape: (attr0 >> 14) as u8,
            x: attr1 & 0x1ff,
            rotsca: ((attr1 >> 9) & 0x1f) as u8,
            size: (attr1 >> 14) as u8,
            char_name: attr2 & 0x3ff,
            prio: ((attr2 >> 10) & 3) as u8,
            pal: (attr2 >> 12) as u8,
        }
    }
    pub fn pack(&self) -> [u8; OAM_LEN] {
        let [a, b, c] = self.to_words().map(u16::to_le_bytes);
        [a[0], a[1], b[0], b[1], c[0], c[1]]
    }
    fn parse(data: &[u8]) -> ParseResult<'_, Self> {
        let (rest, attr0) = le_u16(data)?;
        let (rest, attr1) = le_u16(rest)?;
        let (rest, attr2) = le_u16(rest)?;
        Ok((rest, Self::from_words([attr0, attr1, attr2])))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Cell {
    /// Never empty.
    pub oams: Vec<Oam>,
    pub read_only: u16,
    pub max_x: i16,
    pub max_y: i16,
    pub min_x: i16,
    pub min_y: i16,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            oams: vec![Oam::default()],
            read_only: 0,
            max_x: 0,
            max_y: 0,
            min_x: 0,
            min_y: 0,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ncer {
    pub cells: Vec<Cell>,
    pub labels: Vec<String>,
    /// Cells carry a bounding box and may hold several OAMs.
    pub extended: bool,
    pub mapping_type: u32,
    /// Payload of the TXEU trailer, `None` when the file has none.
    pub texu: Option<u8>,
}

impl Default for Ncer {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            labels: Vec::new(),
            extended: true,
            mapping_type: 0,
            texu: Some(0),
        }
    }
}

impl Ncer {
    #[inline]
    fn record_len(extended: bool) -> usize {
        if extended {
            0x10
        } else {
            0x8
        }
    }
    /// Size of the canvas needed to draw every cell's first OAM.
    pub fn get_size(&self) -> Result<(u32, u32)> {
        if self.cells.is_empty() {
            return Err(value_error("can't compute the size of an NCER without cells"));
        }
        let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
        let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
        for cell in &self.cells {
            let oam = cell
                .oams
                .first()
                .ok_or_else(|| value_error("cell without OAMs"))?;
            let (x, y) = oam.position();
            let (w, h) = oam.get_size()?;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x + w as i32);
            max_y = max_y.max(y + h as i32);
        }
        Ok(((max_x - min_x) as u32, (max_y - min_y) as u32))
    }

    fn parse(data: &[u8]) -> ParseResult<'_, Self> {
        let (body, header) = ChunkHeader::parse(data, &[b"RECN"])?;
        let (_, (mut ncer, kbec_size)) = context("KBEC", Self::parse_kbec)(body)?;
        let mut end = ChunkHeader::LEN + kbec_size as usize;
        let mut sections = 1;
        if data.get(end..end + 4) == Some(b"LBAL".as_slice()) {
            let (rest, labels) = util::parse_labels(&data[end..])?;
            end = data.len() - rest.len();
            ncer.labels = labels;
            sections += 1;
        }
        ncer.texu = util::find_txeu(data, end);
        sections += ncer.texu.is_some() as u16;
        util::check_sections(data, &header, sections)?;
        log::debug!(
            "NCER: {} cells, {} labels, extended {}",
            ncer.cells.len(),
            ncer.labels.len(),
            ncer.extended
        );
        Ok((&data[data.len()..], ncer))
    }
    fn parse_kbec(data: &[u8]) -> ParseResult<'_, (Self, u32)> {
        let (rest, _) = tag(b"KBEC")(data)?;
        let (rest, size) = le_u32(rest)?;
        let (rest, cell_count) = le_u16(rest)?;
        let (rest, extended) = le_u16(rest)?;
        let (rest, cell_offset) = le_u32(rest)?;
        let (_, mapping_type) = le_u32(rest)?;
        let extended = extended == 1;

        let (cell_table, _) = take(cell_offset as usize + 8)(data)?;
        let oam_pool = cell_table
            .get(cell_count as usize * Self::record_len(extended)..)
            .ok_or_else(|| nom_fail(cell_table))?;
        let (rest, cells) = count(
            |d| Self::parse_cell(d, extended, oam_pool),
            cell_count as usize,
        )(cell_table)?;
        let ncer = Self {
            cells,
            labels: Vec::new(),
            extended,
            mapping_type,
            texu: None,
        };
        Ok((rest, (ncer, size)))
    }
    fn parse_cell<'a>(
        data: &'a [u8],
        extended: bool,
        oam_pool: &'a [u8],
    ) -> ParseResult<'a, Cell> {
        let (rest, oam_count) = le_u16(data)?;
        let (rest, read_only) = le_u16(rest)?;
        let (mut rest, oam_offset) = le_u32(rest)?;
        if oam_count == 0 || (!extended && oam_count != 1) {
            return Err(nom_fail(data));
        }
        let mut cell = Cell {
            oams: Vec::new(),
            read_only,
            ..Default::default()
        };
        if extended {
            let (r, max_x) = le_i16(rest)?;
            let (r, max_y) = le_i16(r)?;
            let (r, min_x) = le_i16(r)?;
            let (r, min_y) = le_i16(r)?;
            rest = r;
            (cell.max_x, cell.max_y, cell.min_x, cell.min_y) = (max_x, max_y, min_x, min_y);
        }
        let (oams, _) = context("OAM", take(oam_offset as usize))(oam_pool)?;
        let (_, oams) = context("OAM", count(Oam::parse, oam_count as usize))(oams)?;
        cell.oams = oams;
        Ok((rest, cell))
    }
}

impl NitroFile for Ncer {
    fn unpack(data: &[u8]) -> Result<Self> {
        parse_file("NCER", data, Self::parse)
    }
    fn pack(&self) -> Result<Vec<u8>> {
        for (i, cell) in self.cells.iter().enumerate() {
            if cell.oams.is_empty() {
                return Err(value_error(format_args!("cell {i} has no OAMs")));
            }
            if !self.extended && cell.oams.len() != 1 {
                return Err(value_error(format_args!(
                    "cell {i} has {} OAMs, but only extended NCERs support more than one",
                    cell.oams.len()
                )));
            }
        }
        let cell_count = u16::try_from(self.cells.len())
            .map_err(|_| value_error("too many cells"))?;
        let oam_count: usize = self.cells.iter().map(|c| c.oams.len()).sum();
        let record_len = Self::record_len(self.extended);
        let kbec_size = KBEC_HEADER_LEN + self.cells.len() * record_len + oam_count * OAM_LEN;
        let has_labels = !self.labels.is_empty();
        let labels_len = if has_labels { util::labels_len(&self.labels) } else { 0 };
        let txeu_len = if self.texu.is_some() { util::TXEU_LEN } else { 0 };
        let sections = 1 + has_labels as u16 + self.texu.is_some() as u16;

        let body_len = kbec_size + labels_len + txeu_len;
        let mut w: Vec<u8> = Vec::with_capacity(ChunkHeader::LEN + body_len);
        ChunkHeader::new(b"RECN", 0x0100, body_len, sections)?.write(&mut w)?;
        w.write_all(b"KBEC")?;
        w.write_all(&(kbec_size as u32).to_le_bytes())?;
        w.write_all(&cell_count.to_le_bytes())?;
        w.write_all(&(self.extended as u16).to_le_bytes())?;
        w.write_all(&0x18u32.to_le_bytes())?;
        w.write_all(&self.mapping_type.to_le_bytes())?;
        w.write_all(&[0; 12])?;

        let mut oam_offset = 0u32;
        for cell in &self.cells {
            w.write_all(&(cell.oams.len() as u16).to_le_bytes())?;
            w.write_all(&cell.read_only.to_le_bytes())?;
            w.write_all(&oam_offset.to_le_bytes())?;
            if self.extended {
                w.write_all(&cell.max_x.to_le_bytes())?;
                w.write_all(&cell.max_y.to_le_bytes())?;
                w.write_all(&cell.min_x.to_le_bytes())?;
                w.write_all(&cell.min_y.to_le_bytes())?;
            }
            oam_offset += (cell.oams.len() * OAM_LEN) as u32;
        }
        for oam in self.cells.iter().flat_map(|c| &c.oams) {
            w.write_all(&oam.pack())?;
        }
        if has_labels {
            util::write_labels(&self.labels, &mut w)?;
        }
        if let Some(texu) = self.texu {
            util::write_txeu(texu, &mut w)?;
        }
        Ok(w)
    }
}
