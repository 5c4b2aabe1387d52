use std::path::{Path, PathBuf};

use crate::{
    convert, document,
    gfx::IndexedImage,
    ncgr::BitDepth,
    NitroFile,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
enum Depth {
    #[value(name = "4")]
    Four,
    #[value(name = "8")]
    Eight,
}

impl From<Depth> for BitDepth {
    fn from(value: Depth) -> Self {
        match value {
            Depth::Four => BitDepth::Four,
            Depth::Eight => BitDepth::Eight,
        }
    }
}

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    target: Target,
}

#[derive(clap::Subcommand)]
enum Target {
    /// Splits an indexed PNG into an 8 bpp tileset, tilemap and palette
    Tilemap {
        /// Indexed PNG
        png: PathBuf,
        /// Tileset to output to [default: PNG with .NCGR extension]
        #[arg(long)]
        ncgr: Option<PathBuf>,
        /// Tilemap to output to [default: PNG with .NSCR extension]
        #[arg(long)]
        nscr: Option<PathBuf>,
        /// Palette to output to [default: PNG with .NCLR extension]
        #[arg(long)]
        nclr: Option<PathBuf>,
    },
    /// Cuts an indexed PNG into tiles without removing duplicates
    Tileset {
        /// Indexed PNG
        png: PathBuf,
        /// Bits per pixel
        #[arg(short, long, value_enum, default_value_t = Depth::Eight)]
        bpp: Depth,
        /// Store tiles in the NCBR layout
        #[arg(long, default_value_t = false)]
        ncbr: bool,
        /// Tileset to output to [default: PNG with .NCGR extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Builds a palette from a JASC-PAL file or the palette of an indexed PNG
    Palette {
        /// PAL or PNG file
        input: PathBuf,
        /// Use the shorter NCPR header
        #[arg(long, default_value_t = false)]
        ncpr: bool,
        /// Mark the palette as 4 bpp
        #[arg(long, default_value_t = false)]
        four_bpp: bool,
        /// Palette to output to [default: input with .NCLR extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Builds a cell bank from JSON
    Cells {
        /// JSON document
        json: PathBuf,
        /// NCER to output to [default: JSON with .NCER extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Builds a cell animation from JSON
    Anim {
        /// JSON document
        json: PathBuf,
        /// NANR to output to [default: JSON with .NANR extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn output_path(output: Option<PathBuf>, input: &Path, ext: &str) -> PathBuf {
    output.unwrap_or_else(|| input.with_extension(ext))
}

fn read_png(path: &Path) -> crate::Result<IndexedImage> {
    log::debug!("Reading `{}`", path.display());
    let img = IndexedImage::read_png(&std::fs::read(path)?)?;
    log::info!(
        "`{}`: {}x{}, {} colors",
        path.display(),
        img.width,
        img.height,
        img.palette.len()
    );
    Ok(img)
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("png"))
}

pub fn build(args: Args) -> crate::Result<()> {
    match args.target {
        Target::Tilemap {
            png,
            ncgr,
            nscr,
            nclr,
        } => {
            let img = read_png(&png)?;
            let (tileset, tilemap, palette) = convert::raster_to_triple(&img)?;
            log::info!(
                "{} unique tiles in {} map entries",
                tileset.tiles.len(),
                tilemap.map.len()
            );
            tileset.save_as(output_path(ncgr, &png, "NCGR"))?;
            tilemap.save_as(output_path(nscr, &png, "NSCR"))?;
            palette.save_as(output_path(nclr, &png, "NCLR"))?;
        }
        Target::Tileset {
            png,
            bpp,
            ncbr,
            output,
        } => {
            let img = read_png(&png)?;
            let mut ncgr = convert::raster_to_tileset(&img, bpp.into())?;
            ncgr.ncbr = ncbr;
            log::info!("{} tiles", ncgr.tiles.len());
            let ext = if ncbr { "NCBR" } else { "NCGR" };
            ncgr.save_as(output_path(output, &png, ext))?;
        }
        Target::Palette {
            input,
            ncpr,
            four_bpp,
            output,
        } => {
            let mut nclr = if is_png(&input) {
                convert::raster_to_palette(&read_png(&input)?)
            } else {
                log::debug!("Reading `{}`", input.display());
                convert::read_jasc(&std::fs::read_to_string(&input)?)?
            };
            nclr.ncpr = ncpr;
            nclr.is8bpp = !four_bpp;
            log::info!("{} colors", nclr.colors.len());
            let output = output_path(output, &input, if ncpr { "NCPR" } else { "NCLR" });
            nclr.save_as(output)?;
        }
        Target::Cells { json, output } => {
            let doc: document::NcerDocument = document::load_json(&json)?;
            let ncer = doc.to_ncer()?;
            log::info!("{} cells", ncer.cells.len());
            ncer.save_as(output_path(output, &json, "NCER"))?;
        }
        Target::Anim { json, output } => {
            let doc: document::NanrDocument = document::load_json(&json)?;
            let nanr = doc.to_nanr()?;
            log::info!(
                "{} sequences, {} frames",
                nanr.sequences.len(),
                nanr.total_frames()
            );
            nanr.save_as(output_path(output, &json, "NANR"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_detection() {
        assert!(is_png(Path::new("a/b.PNG")));
        assert!(is_png(Path::new("b.png")));
        assert!(!is_png(Path::new("b.pal")));
        assert!(!is_png(Path::new("png")));
    }
}
