pub mod build;
pub mod convert;
pub mod document;
pub mod extract;
pub mod gfx;
pub mod inspect;
pub mod nanr;
pub mod ncer;
pub mod ncgr;
pub mod nclr;
pub mod nscr;
pub mod tile;
pub mod util;

pub use nanr::Nanr;
pub use ncer::Ncer;
pub use ncgr::Ncgr;
pub use nclr::Nclr;
pub use nscr::Nscr;
pub use tile::Tile;

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad magic, truncated buffer or inconsistent section sizes.
    #[error("Malformed {format}: {message}")]
    Format {
        format: &'static str,
        message: String,
    },
    #[error("{0}")]
    Value(String),
    #[error("Tile ({x}, {y}) is outside of the {width}x{height} tile grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("PNG error: {0}")]
    Png(#[from] lodepng::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A binary Nitro file that can be read from and written to raw bytes.
pub trait NitroFile: Sized {
    fn unpack(data: &[u8]) -> Result<Self>;
    fn pack(&self) -> Result<Vec<u8>>;

    fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Reading `{}`", path.display());
        let data = std::fs::read(path)?;
        Self::unpack(&data)
    }
    fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.pack()?;
        log::debug!("Writing `{}` ({} bytes)", path.display(), data.len());
        std::fs::write(path, data)?;
        Ok(())
    }
}

type ParseResult<'a, T> = nom::IResult<&'a [u8], T, nom::error::VerboseError<&'a [u8]>>;

#[inline]
fn nom_fail<'a, E: nom::error::ParseError<&'a [u8]>>(input: &'a [u8]) -> nom::Err<E> {
    nom::Err::Error(nom::error::make_error(input, nom::error::ErrorKind::Fail))
}

#[inline]
fn value_error(args: impl std::fmt::Display) -> Error {
    Error::Value(args.to_string())
}

/// Runs a parser over a whole file and renders a failure as a format error.
fn parse_file<'a, T>(
    format: &'static str,
    data: &'a [u8],
    parser: impl FnOnce(&'a [u8]) -> ParseResult<'a, T>,
) -> Result<T> {
    parser(data).map(|(_, v)| v).map_err(|e| Error::Format {
        format,
        message: convert_error(data, e),
    })
}

fn convert_error<I: std::ops::Deref<Target = [u8]>>(
    input: I,
    e: nom::Err<nom::error::VerboseError<I>>,
) -> String {
    use std::fmt::Write;

    let e = match e {
        nom::Err::Incomplete(nom::Needed::Unknown) => return "Incomplete".into(),
        nom::Err::Incomplete(nom::Needed::Size(n)) => return format!("Need {n} more bytes"),
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
    };
    let mut result = String::new();
    for (i, (substring, kind)) in e.errors.iter().enumerate() {
        let offset = nom::Offset::offset(&*input, substring);

        // writing into a String cannot fail
        let _ = if i == 0 {
            write!(&mut result, "Parse error at position 0x{offset:x}")
        } else {
            write!(&mut result, ", 0x{offset:x}")
        };

        let _ = match kind {
            nom::error::VerboseErrorKind::Char(c) => write!(&mut result, " expecting '{c}'"),
            nom::error::VerboseErrorKind::Context(context) => write!(&mut result, " in {context}"),
            nom::error::VerboseErrorKind::Nom(err) => write!(&mut result, " ({err:?})"),
        };
    }
    result
}

#[inline]
pub fn is_log_level(lvl: log::LevelFilter) -> bool {
    lvl <= log::STATIC_MAX_LEVEL && lvl <= log::max_level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_name_the_chunk() {
        let data = b"RGCN\xff\xfe";
        let err = parse_file("NCGR", data, |d| {
            nom::error::context("RAHC", nom::number::complete::le_u32)(&d[4..])
        })
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Malformed NCGR"), "{msg}");
        assert!(msg.contains("in RAHC"), "{msg}");
        assert!(msg.contains("0x4"), "{msg}");
    }
}
