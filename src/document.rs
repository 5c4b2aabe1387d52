//! JSON documents describing cell banks and animations, in the layout used
//! by existing NCER/NANR editing tools.

use crate::{
    nanr::{AnimMode, Frame, FrameData, FrameKind, SeqType, Sequence},
    ncer::{Cell, ColorDepth, Oam},
    value_error, Nanr, Ncer, Result,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Accepts `true`/`false` as well as integers.
fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u64),
    }
    Ok(match Flag::deserialize(d)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

/// Bounding box values are sometimes stored unsigned.
fn bbox<'de, D: Deserializer<'de>>(d: D) -> Result<i16, D::Error> {
    let v = i32::deserialize(d)?;
    match v {
        -0x8000..=0xffff => Ok(v as u16 as i16),
        _ => Err(serde::de::Error::custom(format_args!(
            "bounding box value {v} out of range"
        ))),
    }
}

fn default_texu() -> Option<u8> {
    Some(0)
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attr0 {
    pub y_coordinate: u8,
    #[serde(deserialize_with = "flag")]
    pub rotation: bool,
    #[serde(deserialize_with = "flag")]
    pub size_disable: bool,
    pub mode: u8,
    #[serde(deserialize_with = "flag")]
    pub mosaic: bool,
    pub colours: ColorDepth,
    pub shape: u8,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attr1 {
    pub x_coordinate: u16,
    pub rotation_scaling: u8,
    pub size: u8,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attr2 {
    pub char_name: u16,
    pub priority: u8,
    pub palette: u8,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OamDocument {
    #[serde(rename = "Attr0")]
    pub attr0: Attr0,
    #[serde(rename = "Attr1")]
    pub attr1: Attr1,
    #[serde(rename = "Attr2")]
    pub attr2: Attr2,
}

impl From<&Oam> for OamDocument {
    fn from(oam: &Oam) -> Self {
        Self {
            attr0: Attr0 {
                y_coordinate: oam.y,
                rotation: oam.rot,
                size_disable: oam.size_disable,
                mode: oam.mode,
                mosaic: oam.mosaic,
                colours: oam.colors,
                shape: oam.shape,
            },
            attr1: Attr1 {
                x_coordinate: oam.x,
                rotation_scaling: oam.rotsca,
                size: oam.size,
            },
            attr2: Attr2 {
                char_name: oam.char_name,
                priority: oam.prio,
                palette: oam.pal,
            },
        }
    }
}

impl From<&OamDocument> for Oam {
    fn from(doc: &OamDocument) -> Self {
        Self {
            y: doc.attr0.y_coordinate,
            rot: doc.attr0.rotation,
            size_disable: doc.attr0.size_disable,
            mode: doc.attr0.mode,
            mosaic: doc.attr0.mosaic,
            colors: doc.attr0.colours,
            shape: doc.attr0.shape,
            x: doc.attr1.x_coordinate,
            rotsca: doc.attr1.rotation_scaling,
            size: doc.attr1.size,
            char_name: doc.attr2.char_name,
            prio: doc.attr2.priority,
            pal: doc.attr2.palette,
        }
    }
}

/// A cell's OAMs: a bare object when there is only one.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OamList {
    Many(Vec<OamDocument>),
    One(OamDocument),
}

impl OamList {
    fn to_oams(&self) -> Vec<Oam> {
        match self {
            Self::One(doc) => vec![doc.into()],
            Self::Many(docs) => docs.iter().map(Oam::from).collect(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDocument {
    pub read_only: u16,
    #[serde(deserialize_with = "bbox")]
    pub max_x: i16,
    #[serde(deserialize_with = "bbox")]
    pub max_y: i16,
    #[serde(deserialize_with = "bbox")]
    pub min_x: i16,
    #[serde(deserialize_with = "bbox")]
    pub min_y: i16,
    #[serde(rename = "OAM")]
    pub oam: OamList,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NcerDocument {
    pub label_enabled: bool,
    pub extended: bool,
    #[serde(default)]
    pub image_height: u32,
    #[serde(default)]
    pub image_width: u32,
    #[serde(default)]
    pub cell_count: usize,
    pub mapping_type: u32,
    pub cells: Vec<CellDocument>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub label_count: usize,
    /// `null` for files without a TXEU section.
    #[serde(default = "default_texu")]
    pub texu: Option<u8>,
}

impl NcerDocument {
    pub fn from_ncer(ncer: &Ncer) -> Result<Self> {
        // measured from sign-extended OAM positions, so cells that reach past
        // the top or left edge give a smaller size than raw coordinates would
        let (image_width, image_height) = if ncer.cells.is_empty() {
            (0, 0)
        } else {
            ncer.get_size()?
        };
        let cells = ncer
            .cells
            .iter()
            .map(|cell| CellDocument {
                read_only: cell.read_only,
                max_x: cell.max_x,
                max_y: cell.max_y,
                min_x: cell.min_x,
                min_y: cell.min_y,
                oam: match &cell.oams[..] {
                    [oam] => OamList::One(oam.into()),
                    oams => OamList::Many(oams.iter().map(OamDocument::from).collect()),
                },
            })
            .collect();
        Ok(Self {
            label_enabled: !ncer.labels.is_empty(),
            extended: ncer.extended,
            image_height,
            image_width,
            cell_count: ncer.cells.len(),
            mapping_type: ncer.mapping_type,
            cells,
            labels: ncer.labels.clone(),
            label_count: ncer.labels.len(),
            texu: ncer.texu,
        })
    }
    pub fn to_ncer(&self) -> Result<Ncer> {
        let cells = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                let oams = doc.oam.to_oams();
                if oams.is_empty() {
                    return Err(value_error(format_args!("cell {i} has no OAMs")));
                }
                Ok(Cell {
                    oams,
                    read_only: doc.read_only,
                    max_x: doc.max_x,
                    max_y: doc.max_y,
                    min_x: doc.min_x,
                    min_y: doc.min_y,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        if self.cell_count != 0 && self.cell_count != cells.len() {
            log::warn!(
                "cellCount is {}, but the document has {} cells",
                self.cell_count,
                cells.len()
            );
        }
        Ok(Ncer {
            cells,
            labels: if self.label_enabled {
                self.labels.clone()
            } else {
                Vec::new()
            },
            extended: self.extended,
            mapping_type: self.mapping_type,
            texu: self.texu,
        })
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDocument {
    pub duration: u16,
    pub index: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rot_z: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_y: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_x: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_y: Option<i16>,
}

impl From<&Frame> for FrameDocument {
    fn from(frame: &Frame) -> Self {
        let mut doc = Self {
            duration: frame.duration,
            index: frame.data.index(),
            ..Default::default()
        };
        match frame.data {
            FrameData::Index { padding, .. } => doc.padding = Some(padding),
            FrameData::Affine {
                rot_z,
                sx,
                sy,
                px,
                py,
                ..
            } => {
                doc.rot_z = Some(rot_z);
                doc.scale_x = Some(sx);
                doc.scale_y = Some(sy);
                doc.pos_x = Some(px);
                doc.pos_y = Some(py);
            }
            FrameData::Offset { px, py, .. } => {
                doc.pos_x = Some(px);
                doc.pos_y = Some(py);
            }
        }
        doc
    }
}

impl FrameDocument {
    fn to_frame(&self, kind: FrameKind) -> Result<Frame> {
        let affine = self.rot_z.is_some() || self.scale_x.is_some() || self.scale_y.is_some();
        let position = self.pos_x.is_some() || self.pos_y.is_some();
        let foreign = match kind {
            FrameKind::Index => affine || position,
            FrameKind::Affine => self.padding.is_some(),
            FrameKind::Offset => affine || self.padding.is_some(),
        };
        if foreign {
            return Err(value_error(format_args!(
                "frame showing cell {} has fields that {kind:?} frames don't have",
                self.index
            )));
        }
        let index = self.index;
        let data = match kind {
            FrameKind::Index => FrameData::Index {
                index,
                padding: self.padding.unwrap_or(0),
            },
            FrameKind::Affine => FrameData::Affine {
                index,
                rot_z: self.rot_z.unwrap_or(0),
                sx: self.scale_x.unwrap_or(0),
                sy: self.scale_y.unwrap_or(0),
                px: self.pos_x.unwrap_or(0),
                py: self.pos_y.unwrap_or(0),
            },
            FrameKind::Offset => FrameData::Offset {
                index,
                px: self.pos_x.unwrap_or(0),
                py: self.pos_y.unwrap_or(0),
            },
        };
        Ok(Frame {
            duration: self.duration,
            data,
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceDocument {
    pub first_frame: u16,
    #[serde(rename = "type")]
    pub seq_type: SeqType,
    pub mode: AnimMode,
    pub frame_type: FrameKind,
    pub frames: Vec<FrameDocument>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NanrDocument {
    #[serde(default)]
    pub sequence_count: usize,
    #[serde(default)]
    pub total_frames: usize,
    pub sequences: Vec<SequenceDocument>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub label_count: usize,
    #[serde(default = "default_texu")]
    pub texu: Option<u8>,
}

impl From<&Nanr> for NanrDocument {
    fn from(nanr: &Nanr) -> Self {
        let sequences = nanr
            .sequences
            .iter()
            .map(|seq| SequenceDocument {
                first_frame: seq.first_frame,
                seq_type: seq.seq_type,
                mode: seq.mode,
                frame_type: seq.frame_kind,
                frames: seq.frames.iter().map(FrameDocument::from).collect(),
            })
            .collect();
        Self {
            sequence_count: nanr.sequences.len(),
            total_frames: nanr.total_frames(),
            sequences,
            labels: nanr.labels.clone(),
            label_count: nanr.labels.len(),
            texu: nanr.texu,
        }
    }
}

impl NanrDocument {
    pub fn to_nanr(&self) -> Result<Nanr> {
        let sequences = self
            .sequences
            .iter()
            .map(|doc| {
                let frames = doc
                    .frames
                    .iter()
                    .map(|f| f.to_frame(doc.frame_type))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Sequence {
                    first_frame: doc.first_frame,
                    seq_type: doc.seq_type,
                    mode: doc.mode,
                    frame_kind: doc.frame_type,
                    frames,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Nanr {
            sequences,
            labels: self.labels.clone(),
            texu: self.texu,
        })
    }
}

/// Pretty-prints with 4-space indentation.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    String::from_utf8(out).map_err(value_error)
}

pub fn ncer_to_json(ncer: &Ncer) -> Result<String> {
    to_json(&NcerDocument::from_ncer(ncer)?)
}

pub fn json_to_ncer(text: &str) -> Result<Ncer> {
    serde_json::from_str::<NcerDocument>(text)?.to_ncer()
}

pub fn nanr_to_json(nanr: &Nanr) -> Result<String> {
    to_json(&NanrDocument::from(nanr))
}

pub fn json_to_nanr(text: &str) -> Result<Nanr> {
    serde_json::from_str::<NanrDocument>(text)?.to_nanr()
}

pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = to_json(value)?;
    log::debug!("Writing `{}`", path.display());
    std::fs::write(path, text)?;
    Ok(())
}

pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    log::debug!("Reading `{}`", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
