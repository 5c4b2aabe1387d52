//! Pieces shared by every Nitro format: colors, the common chunk header, the
//! LBAL label table and the TXEU trailer.

use crate::{nom_fail, value_error, Result};
use nom::{
    bytes::complete::{tag, take},
    error::{context, ContextError, ParseError},
    number::complete::{le_u16, le_u32},
};
use rgb::RGB8;
use std::io;

pub const BYTE_ORDER_MARK: u16 = 0xFEFF;
pub const HEADER_SIZE: u16 = 0x10;

/// Converts a color to 15-bit BGR555, dropping the low 3 bits of each channel.
#[inline]
pub fn color_to_rgb555(c: RGB8) -> u16 {
    let r = (c.r / 8) as u16;
    let g = (c.g / 8) as u16;
    let b = (c.b / 8) as u16;
    r | (g << 5) | (b << 10)
}

#[inline]
pub fn rgb555_to_color(c: u16) -> RGB8 {
    let r = (c & 0x1f) as u8;
    let g = ((c >> 5) & 0x1f) as u8;
    let b = ((c >> 10) & 0x1f) as u8;
    RGB8::new(r * 8, g * 8, b * 8)
}

/// The 16-byte header at the start of every Nitro file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkHeader {
    pub magic: [u8; 4],
    pub version: u16,
    /// Total file size, including this header.
    pub size: u32,
    pub sections: u16,
}

impl ChunkHeader {
    pub const LEN: usize = HEADER_SIZE as usize;

    /// Header for a file whose sections take up `body_len` bytes.
    pub fn new(magic: &[u8; 4], version: u16, body_len: usize, sections: u16) -> Result<Self> {
        let size = u32::try_from(body_len + Self::LEN)
            .map_err(|_| value_error(format_args!("file too large: {body_len} bytes")))?;
        Ok(Self {
            magic: *magic,
            version,
            size,
            sections,
        })
    }
    /// Parses the header of the file `data`. A declared size larger than
    /// `data` means the file was cut short and fails.
    pub fn parse<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        data: &'a [u8],
        magics: &[&[u8; 4]],
    ) -> nom::IResult<&'a [u8], Self, E> {
        context("file header", |d| Self::parse_fields(d, magics))(data)
    }
    fn parse_fields<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
        data: &'a [u8],
        magics: &[&[u8; 4]],
    ) -> nom::IResult<&'a [u8], Self, E> {
        let (rest, magic) = take(4usize)(data)?;
        let magic = match magics.iter().find(|m| m.as_slice() == magic) {
            Some(m) => **m,
            None => return Err(nom_fail(data)),
        };
        let (rest, _) = tag(b"\xff\xfe")(rest)?;
        let (rest, version) = le_u16(rest)?;
        let (rest, size) = context("file size", |d| Self::parse_size(d, data.len()))(rest)?;
        let (rest, _header_size) = le_u16(rest)?;
        let (rest, sections) = le_u16(rest)?;
        Ok((
            rest,
            Self {
                magic,
                version,
                size,
                sections,
            },
        ))
    }
    fn parse_size<'a, E: ParseError<&'a [u8]>>(
        data: &'a [u8],
        file_len: usize,
    ) -> nom::IResult<&'a [u8], u32, E> {
        let (rest, size) = le_u32(data)?;
        match size as usize <= file_len {
            true => Ok((rest, size)),
            false => Err(nom_fail(data)),
        }
    }
    pub fn write(&self, w: &mut impl io::Write) -> io::Result<()> {
        w.write_all(&self.magic)?;
        w.write_all(&BYTE_ORDER_MARK.to_le_bytes())?;
        w.write_all(&self.version.to_le_bytes())?;
        w.write_all(&self.size.to_le_bytes())?;
        w.write_all(&HEADER_SIZE.to_le_bytes())?;
        w.write_all(&self.sections.to_le_bytes())?;
        Ok(())
    }
}

/// Fails when the file `data` holds fewer sections than its header declares.
pub fn check_sections<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    data: &'a [u8],
    header: &ChunkHeader,
    found: u16,
) -> nom::IResult<&'a [u8], (), E> {
    // points error positions at the section count field
    let field = data.get(ChunkHeader::LEN - 2..).unwrap_or(data);
    context("section count", |d: &'a [u8]| match found >= header.sections {
        true => Ok((d, ())),
        false => Err(nom_fail(d)),
    })(field)
}

/// Size of the LBAL chunk written for `labels`, including its 8-byte header.
pub fn labels_len(labels: &[String]) -> usize {
    8 + labels.iter().map(|l| l.len() + 5).sum::<usize>()
}

pub fn write_labels(labels: &[String], w: &mut impl io::Write) -> Result<()> {
    for label in labels {
        if !label.is_ascii() || label.contains('\0') {
            return Err(value_error(format_args!(
                "label `{}` must be ASCII without NUL characters",
                label.escape_debug()
            )));
        }
    }
    let size = u32::try_from(labels_len(labels))
        .map_err(|_| value_error("label table too large"))?;
    w.write_all(b"LBAL")?;
    w.write_all(&size.to_le_bytes())?;
    let mut pos = 0u32;
    for label in labels {
        w.write_all(&pos.to_le_bytes())?;
        pos += label.len() as u32 + 1;
    }
    for label in labels {
        w.write_all(label.as_bytes())?;
        w.write_all(&[0])?;
    }
    Ok(())
}

/// Parses an LBAL chunk. The number of labels isn't stored, so it is taken as
/// the smallest count whose offset table agrees with the string block that
/// follows it.
pub fn parse_labels<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    data: &'a [u8],
) -> nom::IResult<&'a [u8], Vec<String>, E> {
    context("LBAL", parse_label_table)(data)
}

fn parse_label_table<'a, E: ParseError<&'a [u8]>>(
    data: &'a [u8],
) -> nom::IResult<&'a [u8], Vec<String>, E> {
    let (body, _) = tag(b"LBAL")(data)?;
    let (body, size) = le_u32(body)?;
    let body_len = (size as usize)
        .checked_sub(8)
        .ok_or_else(|| nom_fail(data))?;
    let (rest, body) = take(body_len)(body)?;
    if body.is_empty() {
        return Ok((rest, Vec::new()));
    }
    for count in 1..=body.len() / 5 {
        let (offsets, strings) = body.split_at(count * 4);
        if let Some(labels) = split_labels(offsets, strings, count) {
            return Ok((rest, labels));
        }
    }
    Err(nom_fail(body))
}

fn split_labels(offsets: &[u8], strings: &[u8], count: usize) -> Option<Vec<String>> {
    if strings.last() != Some(&0) {
        return None;
    }
    let mut labels = Vec::with_capacity(count);
    let mut start = 0usize;
    for (i, label) in strings[..strings.len() - 1].split(|&b| b == 0).enumerate() {
        if i >= count {
            return None;
        }
        let o = &offsets[i * 4..i * 4 + 4];
        if u32::from_le_bytes([o[0], o[1], o[2], o[3]]) as usize != start {
            return None;
        }
        if !label.is_ascii() {
            return None;
        }
        labels.push(String::from_utf8_lossy(label).into_owned());
        start += label.len() + 1;
    }
    (labels.len() == count).then_some(labels)
}

pub const TXEU_LEN: usize = 12;

pub fn write_txeu(texu: u8, w: &mut impl io::Write) -> io::Result<()> {
    w.write_all(b"TXEU")?;
    w.write_all(&(TXEU_LEN as u32).to_le_bytes())?;
    w.write_all(&[texu, 0, 0, 0])
}

/// Finds the TXEU chunk at or after `from` and returns its payload byte.
pub fn find_txeu(data: &[u8], from: usize) -> Option<u8> {
    let tail = data.get(from..)?;
    let pos = tail.windows(4).position(|w| w == b"TXEU")?;
    tail.get(pos + 8).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use nom::error::VerboseError;

    #[test]
    fn color_conversion() {
        let a = RGB8::new(40, 16, 248);
        assert_eq!(rgb555_to_color(color_to_rgb555(a)), a);
        let b = RGB8::new(41, 23, 255);
        assert_eq!(rgb555_to_color(color_to_rgb555(b)), RGB8::new(40, 16, 248));
        assert_eq!(color_to_rgb555(RGB8::new(255, 0, 0)), 0x001f);
        assert_eq!(color_to_rgb555(RGB8::new(0, 0, 255)), 0x7c00);
    }

    #[test]
    fn chunk_header_layout() {
        let mut buf = Vec::new();
        ChunkHeader::new(b"RGCN", 0x0101, 0x30, 2)
            .unwrap()
            .write(&mut buf)
            .unwrap();
        assert_eq!(buf, hex!("5247434e fffe 0101 40000000 1000 0200"));
        buf.resize(0x40, 0);
        let (rest, header) = ChunkHeader::parse::<VerboseError<_>>(&buf, &[b"RGCN"]).unwrap();
        assert_eq!(rest.len(), 0x30);
        assert_eq!(header.size, 0x40);
        assert_eq!(header.sections, 2);
        assert!(ChunkHeader::parse::<VerboseError<_>>(&buf, &[b"RLCN"]).is_err());
    }

    #[test]
    fn chunk_header_rejects_short_file() {
        let mut buf = Vec::new();
        ChunkHeader::new(b"RLCN", 0x0100, 0x20, 1)
            .unwrap()
            .write(&mut buf)
            .unwrap();
        buf.resize(0x2f, 0);
        assert!(ChunkHeader::parse::<VerboseError<_>>(&buf, &[b"RLCN"]).is_err());
        buf.push(0);
        assert!(ChunkHeader::parse::<VerboseError<_>>(&buf, &[b"RLCN"]).is_ok());
        // trailing bytes past the declared size are tolerated
        buf.extend_from_slice(&[0; 8]);
        assert!(ChunkHeader::parse::<VerboseError<_>>(&buf, &[b"RLCN"]).is_ok());
    }

    #[test]
    fn labels_layout() {
        let labels = vec!["CellAnime0".to_string(), "A".to_string()];
        let mut buf = Vec::new();
        write_labels(&labels, &mut buf).unwrap();
        assert_eq!(buf.len(), labels_len(&labels));
        assert_eq!(
            buf,
            hex!(
                "4c42414c 1d000000 00000000 0b000000"
                "43656c6c416e696d653000 4100"
            )
        );
        let (rest, parsed) = parse_labels::<VerboseError<_>>(&buf).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, labels);
    }

    #[test]
    fn labels_with_offset_lookalikes() {
        // control bytes inside the string block read like offset words
        let labels = vec!["\x01".to_string(), "zabc".to_string(), "xy".to_string()];
        let mut buf = Vec::new();
        write_labels(&labels, &mut buf).unwrap();
        buf.extend_from_slice(b"TXEU");
        let (rest, parsed) = parse_labels::<VerboseError<_>>(&buf).unwrap();
        assert_eq!(rest, b"TXEU");
        assert_eq!(parsed, labels);
    }

    #[test]
    fn labels_reject_nul() {
        let mut buf = Vec::new();
        assert!(write_labels(&["a\0b".to_string()], &mut buf).is_err());
    }

    #[test]
    fn txeu_layout() {
        let mut buf = vec![0xaa; 3];
        write_txeu(7, &mut buf).unwrap();
        assert_eq!(buf[3..], hex!("54584555 0c000000 07000000"));
        assert_eq!(find_txeu(&buf, 0), Some(7));
        assert_eq!(find_txeu(&buf, 4), None);
    }
}
