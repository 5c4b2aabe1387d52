//! NANR cell animations.
//!
//! The KNBA section holds three tables, each addressed relative to the start
//! of the section body (absolute offset 0x18):
//!
//! - sequence `i` at `0x18 + seq_offset + 16 * i`
//! - its frame reference `j` at `0x18 + ref_start + seq.ref_offset + 8 * j`
//! - the referenced payload at `0x18 + data_start + frame_ref.offset`
//!
//! Payloads are deduplicated, so several references may share one payload.

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
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::io::Write;

const KNBA_HEADER_LEN: usize = 0x20;
const SEQUENCE_LEN: usize = 0x10;
const FRAME_REF_LEN: usize = 8;
const FRAME_REF_MARKER: u16 = 0xBEEF;
/// Offsets inside KNBA are relative to this absolute position.
const KNBA_BASE: u32 = 0x18;

/// How a sequence plays. Values outside the known modes are kept as read.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum AnimMode {
    Forward,
    #[default]
    ForwardLoop,
    Reverse,
    ReverseLoop,
    Other(u32),
}

impl From<u32> for AnimMode {
    fn from(v: u32) -> Self {
        match v {
            1 => Self::Forward,
            2 => Self::ForwardLoop,
            3 => Self::Reverse,
            4 => Self::ReverseLoop,
            v => Self::Other(v),
        }
    }
}

impl From<AnimMode> for u32 {
    fn from(mode: AnimMode) -> Self {
        match mode {
            AnimMode::Forward => 1,
            AnimMode::ForwardLoop => 2,
            AnimMode::Reverse => 3,
            AnimMode::ReverseLoop => 4,
            AnimMode::Other(v) => v,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum SeqType {
    #[default]
    Cell,
    MultiCell,
    Other(u16),
}

impl From<u16> for SeqType {
    fn from(v: u16) -> Self {
        match v {
            1 => Self::Cell,
            2 => Self::MultiCell,
            v => Self::Other(v),
        }
    }
}

impl From<SeqType> for u16 {
    fn from(t: SeqType) -> Self {
        match t {
            SeqType::Cell => 1,
            SeqType::MultiCell => 2,
            SeqType::Other(v) => v,
        }
    }
}

/// Shape of a frame's payload.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum FrameKind {
    #[default]
    Index = 0,
    Affine = 1,
    Offset = 2,
}

impl FrameKind {
    pub fn from_raw(v: u16) -> Option<Self> {
        Some(match v {
            0 => Self::Index,
            1 => Self::Affine,
            2 => Self::Offset,
            _ => return None,
        })
    }
    #[inline]
    pub fn payload_len(self) -> usize {
        match self {
            Self::Index => 4,
            Self::Affine => 16,
            Self::Offset => 8,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FrameData {
    Index {
        index: u16,
        padding: u16,
    },
    Affine {
        index: u16,
        rot_z: u16,
        sx: u32,
        sy: u32,
        px: i16,
        py: i16,
    },
    Offset {
        index: u16,
        px: i16,
        py: i16,
    },
}

impl Default for FrameData {
    fn default() -> Self {
        Self::Index {
            index: 0,
            padding: 0,
        }
    }
}

impl FrameData {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Index { .. } => FrameKind::Index,
            Self::Affine { .. } => FrameKind::Affine,
            Self::Offset { .. } => FrameKind::Offset,
        }
    }
    /// Cell index shown by the frame.
    pub fn index(&self) -> u16 {
        match *self {
            Self::Index { index, .. } | Self::Affine { index, .. } | Self::Offset { index, .. } => {
                index
            }
        }
    }
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.kind().payload_len());
        match *self {
            Self::Index { index, padding } => {
                out.extend_from_slice(&index.to_le_bytes());
                out.extend_from_slice(&padding.to_le_bytes());
            }
            Self::Affine {
                index,
                rot_z,
                sx,
                sy,
                px,
                py,
            } => {
                out.extend_from_slice(&index.to_le_bytes());
                out.extend_from_slice(&rot_z.to_le_bytes());
                out.extend_from_slice(&sx.to_le_bytes());
                out.extend_from_slice(&sy.to_le_bytes());
                out.extend_from_slice(&px.to_le_bytes());
                out.extend_from_slice(&py.to_le_bytes());
            }
            Self::Offset { index, px, py } => {
                out.extend_from_slice(&index.to_le_bytes());
                out.extend_from_slice(&0u16.to_le_bytes());
                out.extend_from_slice(&px.to_le_bytes());
                out.extend_from_slice(&py.to_le_bytes());
            }
        }
        out
    }
    fn parse(data: &[u8], kind: FrameKind) -> ParseResult<'_, Self> {
        let (rest, index) = le_u16(data)?;
        match kind {
            FrameKind::Index => {
                let (rest, padding) = le_u16(rest)?;
                Ok((rest, Self::Index { index, padding }))
            }
            FrameKind::Affine => {
                let (rest, rot_z) = le_u16(rest)?;
                let (rest, sx) = le_u32(rest)?;
                let (rest, sy) = le_u32(rest)?;
                let (rest, px) = le_i16(rest)?;
                let (rest, py) = le_i16(rest)?;
                Ok((
                    rest,
                    Self::Affine {
                        index,
                        rot_z,
                        sx,
                        sy,
                        px,
                        py,
                    },
                ))
            }
            FrameKind::Offset => {
                let (rest, _) = le_u16(rest)?;
                let (rest, px) = le_i16(rest)?;
                let (rest, py) = le_i16(rest)?;
                Ok((rest, Self::Offset { index, px, py }))
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Frame {
    /// In display ticks.
    pub duration: u16,
    pub data: FrameData,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sequence {
    pub first_frame: u16,
    pub seq_type: SeqType,
    pub mode: AnimMode,
    /// Every frame's payload must be of this kind.
    pub frame_kind: FrameKind,
    pub frames: Vec<Frame>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Nanr {
    pub sequences: Vec<Sequence>,
    pub labels: Vec<String>,
    pub texu: Option<u8>,
}

impl Default for Nanr {
    fn default() -> Self {
        Self {
            sequences: Vec::new(),
            labels: Vec::new(),
            texu: Some(0),
        }
    }
}

/// Position of an already stored payload that `payload` can share. Payloads
/// are 2-byte aligned, and `key_len` bytes must match.
///
/// Only aligned positions are searched. Files whose writer also reused
/// payloads at odd offsets repack to a larger pool than they were read from.
fn find_payload(pool: &[u8], payload: &[u8], key_len: usize) -> Option<usize> {
    pool.windows(payload.len())
        .step_by(2)
        .position(|w| w[..key_len] == payload[..key_len])
        .map(|i| i * 2)
}

impl Nanr {
    pub fn total_frames(&self) -> usize {
        self.sequences.iter().map(|s| s.frames.len()).sum()
    }

    fn parse(data: &[u8]) -> ParseResult<'_, Self> {
        let (body, header) = ChunkHeader::parse(data, &[b"RNAN"])?;
        let (_, (sequences, knba_size)) = context("KNBA", Self::parse_knba)(body)?;
        let mut nanr = Self {
            sequences,
            labels: Vec::new(),
            texu: None,
        };
        let mut end = ChunkHeader::LEN + knba_size as usize;
        let mut sections = 1;
        if data.get(end..end + 4) == Some(b"LBAL".as_slice()) {
            let (rest, labels) = util::parse_labels(&data[end..])?;
            end = data.len() - rest.len();
            nanr.labels = labels;
            sections += 1;
        }
        nanr.texu = util::find_txeu(data, end);
        sections += nanr.texu.is_some() as u16;
        util::check_sections(data, &header, sections)?;
        log::debug!(
            "NANR: {} sequences, {} frames, {} labels",
            nanr.sequences.len(),
            nanr.total_frames(),
            nanr.labels.len()
        );
        Ok((&data[data.len()..], nanr))
    }
    fn parse_knba(data: &[u8]) -> ParseResult<'_, (Vec<Sequence>, u32)> {
        let (rest, _) = tag(b"KNBA")(data)?;
        let (rest, size) = le_u32(rest)?;
        let (rest, seq_count) = le_u16(rest)?;
        let (rest, total_frames) = le_u16(rest)?;
        let (rest, seq_offset) = le_u32(rest)?;
        let (rest, ref_start) = le_u32(rest)?;
        let (_, data_start) = le_u32(rest)?;

        let (base, _) = take(8usize)(data)?;
        let (seq_table, _) = take(seq_offset as usize)(base)?;
        let (rest, sequences) = count(
            |d| Self::parse_sequence(d, base, ref_start, data_start),
            seq_count as usize,
        )(seq_table)?;
        let frames: usize = sequences.iter().map(|s| s.frames.len()).sum();
        if frames != total_frames as usize {
            log::warn!("NANR declares {total_frames} frames but its sequences hold {frames}");
        }
        Ok((rest, (sequences, size)))
    }
    fn parse_sequence<'a>(
        data: &'a [u8],
        base: &'a [u8],
        ref_start: u32,
        data_start: u32,
    ) -> ParseResult<'a, Sequence> {
        let (rest, frame_count) = le_u16(data)?;
        let (rest, first_frame) = le_u16(rest)?;
        let (rest, frame_kind) = le_u16(rest)?;
        let (rest, seq_type) = le_u16(rest)?;
        let (rest, mode) = le_u32(rest)?;
        let (rest, ref_offset) = le_u32(rest)?;
        let Some(frame_kind) = FrameKind::from_raw(frame_kind) else {
            return Err(nom_fail(data));
        };
        let (seq_type, mode) = (SeqType::from(seq_type), AnimMode::from(mode));
        if let SeqType::Other(v) = seq_type {
            log::warn!("NANR sequence has unknown type {v}, keeping it as is");
        }
        if let AnimMode::Other(v) = mode {
            log::warn!("NANR sequence has unknown playback mode {v}, keeping it as is");
        }
        let refs_at = ref_start as usize + ref_offset as usize;
        let (refs, _) = context("frame references", take(refs_at))(base)?;
        let (_, frames) = count(
            |d| Self::parse_frame(d, base, data_start, frame_kind),
            frame_count as usize,
        )(refs)?;
        Ok((
            rest,
            Sequence {
                first_frame,
                seq_type,
                mode,
                frame_kind,
                frames,
            },
        ))
    }
    fn parse_frame<'a>(
        data: &'a [u8],
        base: &'a [u8],
        data_start: u32,
        kind: FrameKind,
    ) -> ParseResult<'a, Frame> {
        let (rest, offset) = le_u32(data)?;
        let (rest, duration) = le_u16(rest)?;
        let (rest, _marker) = le_u16(rest)?;
        let (payload, _) = take(data_start as usize + offset as usize)(base)?;
        let (_, data) = context("frame data", |d| FrameData::parse(d, kind))(payload)?;
        Ok((rest, Frame { duration, data }))
    }
}

impl NitroFile for Nanr {
    fn unpack(data: &[u8]) -> Result<Self> {
        parse_file("NANR", data, Self::parse)
    }
    fn pack(&self) -> Result<Vec<u8>> {
        let seq_count = u16::try_from(self.sequences.len())
            .map_err(|_| value_error("too many sequences"))?;
        let total_frames = u16::try_from(self.total_frames())
            .map_err(|_| value_error("too many frames"))?;

        let mut pool: Vec<u8> = Vec::new();
        let mut refs: Vec<(u32, u16)> = Vec::with_capacity(total_frames as usize);
        for (i, seq) in self.sequences.iter().enumerate() {
            for frame in &seq.frames {
                if frame.data.kind() != seq.frame_kind {
                    return Err(value_error(format_args!(
                        "sequence {i} holds {:?} frames, found a {:?} frame",
                        seq.frame_kind,
                        frame.data.kind()
                    )));
                }
                let payload = frame.data.pack();
                // the padding of index frames doesn't take part in matching
                let key_len = match seq.frame_kind {
                    FrameKind::Index => 2,
                    _ => payload.len(),
                };
                let offset = find_payload(&pool, &payload, key_len).unwrap_or_else(|| {
                    pool.extend_from_slice(&payload);
                    pool.len() - payload.len()
                });
                refs.push((offset as u32, frame.duration));
            }
        }

        let ref_start = KNBA_BASE + (self.sequences.len() * SEQUENCE_LEN) as u32;
        let data_start = ref_start + (refs.len() * FRAME_REF_LEN) as u32;
        let knba_size = KNBA_HEADER_LEN
            + self.sequences.len() * SEQUENCE_LEN
            + refs.len() * FRAME_REF_LEN
            + pool.len();
        let has_labels = !self.labels.is_empty();
        let labels_len = if has_labels { util::labels_len(&self.labels) } else { 0 };
        let txeu_len = if self.texu.is_some() { util::TXEU_LEN } else { 0 };
        let sections = 1 + has_labels as u16 + self.texu.is_some() as u16;

        let body_len = knba_size + labels_len + txeu_len;
        let mut w: Vec<u8> = Vec::with_capacity(ChunkHeader::LEN + body_len);
        ChunkHeader::new(b"RNAN", 0x0100, body_len, sections)?.write(&mut w)?;
        w.write_all(b"KNBA")?;
        w.write_all(&(knba_size as u32).to_le_bytes())?;
        w.write_all(&seq_count.to_le_bytes())?;
        w.write_all(&total_frames.to_le_bytes())?;
        w.write_all(&KNBA_BASE.to_le_bytes())?;
        w.write_all(&ref_start.to_le_bytes())?;
        w.write_all(&data_start.to_le_bytes())?;
        w.write_all(&[0; 8])?;

        let mut ref_offset = 0u32;
        for seq in &self.sequences {
            w.write_all(&(seq.frames.len() as u16).to_le_bytes())?;
            w.write_all(&seq.first_frame.to_le_bytes())?;
            w.write_all(&(seq.frame_kind as u16).to_le_bytes())?;
            w.write_all(&u16::from(seq.seq_type).to_le_bytes())?;
            w.write_all(&u32::from(seq.mode).to_le_bytes())?;
            w.write_all(&ref_offset.to_le_bytes())?;
            ref_offset += (seq.frames.len() * FRAME_REF_LEN) as u32;
        }
        for (offset, duration) in refs {
            w.write_all(&offset.to_le_bytes())?;
            w.write_all(&duration.to_le_bytes())?;
            w.write_all(&FRAME_REF_MARKER.to_le_bytes())?;
        }
        w.write_all(&pool)?;
        if has_labels {
            util::write_labels(&self.labels, &mut w)?;
        }
        if let Some(texu) = self.texu {
            util::write_txeu(texu, &mut w)?;
        }
        Ok(w)
    }
}
