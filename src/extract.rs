use std::path::{Path, PathBuf};

use crate::{convert, document, gfx::IndexedImage, NitroFile, Nanr, Ncer, Ncgr, Nclr, Nscr};

#[derive(clap::Args)]
pub struct Args {
    #[command(subcommand)]
    target: Target,
}

#[derive(clap::Subcommand)]
enum Target {
    /// Draws a tilemap into an indexed PNG
    Tilemap {
        /// NCGR or NCBR tileset
        ncgr: PathBuf,
        /// NSCR tilemap
        nscr: PathBuf,
        /// NCLR palette
        nclr: PathBuf,
        /// PNG file to output to [default: NSCR with .png extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Draws every tile of a tileset into an indexed PNG
    Tileset {
        /// NCGR or NCBR tileset
        ncgr: PathBuf,
        /// NCLR palette [default: greyscale]
        #[arg(short, long)]
        palette: Option<PathBuf>,
        /// PNG file to output to [default: NCGR with .png extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Writes a palette as a JASC-PAL file
    Palette {
        /// NCLR or NCPR palette
        nclr: PathBuf,
        /// PAL file to output to [default: NCLR with .pal extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Writes a cell bank as JSON
    Cells {
        /// NCER cell bank
        ncer: PathBuf,
        /// JSON file to output to [default: NCER with .json extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Writes a cell animation as JSON
    Anim {
        /// NANR animation
        nanr: PathBuf,
        /// JSON file to output to [default: NANR with .json extension]
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn output_path(output: Option<PathBuf>, input: &Path, ext: &str) -> PathBuf {
    output.unwrap_or_else(|| input.with_extension(ext))
}

fn write_png(img: &IndexedImage, path: &Path) -> crate::Result<()> {
    let png = img.write_png()?;
    log::info!("Writing `{}` ({}x{})", path.display(), img.width, img.height);
    std::fs::write(path, png)?;
    Ok(())
}

pub fn extract(args: Args) -> crate::Result<()> {
    match args.target {
        Target::Tilemap {
            ncgr,
            nscr,
            nclr,
            output,
        } => {
            let output = output_path(output, &nscr, "png");
            let ncgr = Ncgr::load_from(&ncgr)?;
            let nscr = Nscr::load_from(&nscr)?;
            let nclr = Nclr::load_from(&nclr)?;
            let img = convert::triple_to_raster(&ncgr, &nscr, &nclr)?;
            write_png(&img, &output)?;
        }
        Target::Tileset {
            ncgr,
            palette,
            output,
        } => {
            let output = output_path(output, &ncgr, "png");
            let ncgr = Ncgr::load_from(&ncgr)?;
            let nclr = match palette {
                Some(path) => Nclr::load_from(path)?,
                None => Nclr::monochrome(),
            };
            let img = convert::tileset_to_raster(&ncgr, &nclr);
            write_png(&img, &output)?;
        }
        Target::Palette { nclr, output } => {
            let output = output_path(output, &nclr, "pal");
            let nclr = Nclr::load_from(&nclr)?;
            log::info!("Writing `{}` ({} colors)", output.display(), nclr.colors.len());
            std::fs::write(&output, convert::write_jasc(&nclr))?;
        }
        Target::Cells { ncer, output } => {
            let output = output_path(output, &ncer, "json");
            let ncer = Ncer::load_from(&ncer)?;
            log::info!("Writing `{}` ({} cells)", output.display(), ncer.cells.len());
            document::save_json(&document::NcerDocument::from_ncer(&ncer)?, &output)?;
        }
        Target::Anim { nanr, output } => {
            let output = output_path(output, &nanr, "json");
            let nanr = Nanr::load_from(&nanr)?;
            log::info!(
                "Writing `{}` ({} sequences)",
                output.display(),
                nanr.sequences.len()
            );
            document::save_json(&document::NanrDocument::from(&nanr), &output)?;
        }
    }
    Ok(())
}
