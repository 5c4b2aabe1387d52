use std::path::PathBuf;

use crate::{document, NitroFile, Nanr, Ncer, Ncgr, Nclr, Nscr};

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum Format {
    /// NCGR or NCBR tileset
    Ncgr,
    /// NSCR tilemap
    Nscr,
    /// NCLR or NCPR palette
    Nclr,
    /// NCER cell bank
    Ncer,
    /// NANR cell animation
    Nanr,
}

#[derive(clap::Args)]
pub struct Args {
    /// Nitro file to inspect
    input: PathBuf,
    /// Format to read the file as
    #[arg(short, long, value_enum)]
    format: Format,
    /// Test that the file repacks to the same bytes
    #[arg(short, long, default_value_t = false)]
    test: bool,
}

/// Compares a re-encoding against the original bytes.
fn test_conversion(what: &str, orig: &[u8], converted: &[u8]) -> bool {
    let matches = orig == converted;
    if !matches {
        let at = orig
            .iter()
            .zip(converted)
            .position(|(a, b)| a != b)
            .unwrap_or(orig.len().min(converted.len()));
        log::debug!(
            "{what} does not match at 0x{at:x} ({} vs {} bytes)\n  expected: {:02x?}\n       got: {:02x?}",
            orig.len(),
            converted.len(),
            &orig[at.min(orig.len())..(at + 16).min(orig.len())],
            &converted[at.min(converted.len())..(at + 16).min(converted.len())],
        );
    }
    matches
}

fn inspect_ncgr(ncgr: &Ncgr) {
    let (w, h) = ncgr.dimensions();
    log::info!(
        "Tileset: {} tiles at {} bpp, {w}x{h} tiles{}",
        ncgr.tiles.len(),
        ncgr.bpp.bits(),
        if ncgr.ncbr { ", NCBR layout" } else { "" },
    );
    log::info!("  MAPPING 0x{:x}", ncgr.mapping);
    let max = ncgr.tiles.iter().map(|t| t.max_index()).max().unwrap_or(0);
    log::info!("  Highest color index: {max}");
}

fn inspect_nscr(nscr: &Nscr) {
    let (w, h) = nscr.tile_dimensions();
    log::info!(
        "Tilemap: {}x{} pixels, {w}x{h} entries, {} bpp",
        nscr.width,
        nscr.height,
        if nscr.is8bpp() { 8 } else { 4 }
    );
    let tiles = nscr.map.iter().map(|e| e.tile).max().map_or(0, |t| t + 1);
    let flipped = nscr.map.iter().filter(|e| e.xflip || e.yflip).count();
    let palettes = nscr.map.iter().map(|e| e.pal).max().map_or(0, |p| p + 1);
    log::info!("  Tiles used: {tiles}, flipped entries: {flipped}, palettes used: {palettes}");
}

fn inspect_nclr(nclr: &Nclr) {
    log::info!(
        "Palette: {} colors, {} bpp{}",
        nclr.colors.len(),
        if nclr.is8bpp { 8 } else { 4 },
        if nclr.ncpr { ", NCPR header" } else { "" },
    );
    for (i, row) in nclr.colors.chunks(16).enumerate() {
        let row = row
            .iter()
            .map(|c| format!("{:02x}{:02x}{:02x}", c.r, c.g, c.b))
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("  {i: >2}: {row}");
    }
}

fn inspect_ncer(ncer: &Ncer, verbose: bool) {
    let oams: usize = ncer.cells.iter().map(|c| c.oams.len()).sum();
    log::info!(
        "Cells: {}, OAMs: {oams}, labels: {}, {}",
        ncer.cells.len(),
        ncer.labels.len(),
        if ncer.extended { "extended" } else { "legacy" },
    );
    match ncer.get_size() {
        Ok((w, h)) => log::info!("  Canvas: {w}x{h}"),
        Err(e) => log::info!("  Canvas: {e}"),
    }
    log::info!("  CELL  OAMS RO   MINX   MINY   MAXX   MAXY LABEL");
    for (i, cell) in ncer.cells.iter().enumerate() {
        log::info!(
            "  {i: <5} {: <4} {: <4} {: >6} {: >6} {: >6} {: >6} {}",
            cell.oams.len(),
            cell.read_only,
            cell.min_x,
            cell.min_y,
            cell.max_x,
            cell.max_y,
            ncer.labels.get(i).map(String::as_str).unwrap_or("-"),
        );
        if verbose {
            for oam in &cell.oams {
                log::debug!("        {oam:?}");
            }
        }
    }
}

fn inspect_nanr(nanr: &Nanr, verbose: bool) {
    log::info!(
        "Sequences: {}, frames: {}, labels: {}",
        nanr.sequences.len(),
        nanr.total_frames(),
        nanr.labels.len(),
    );
    log::info!("  SEQ   FRAMES KIND     TYPE      MODE        LABEL");
    for (i, seq) in nanr.sequences.iter().enumerate() {
        log::info!(
            "  {i: <5} {: <6} {: <8} {: <9} {: <11} {}",
            seq.frames.len(),
            format!("{:?}", seq.frame_kind),
            format!("{:?}", seq.seq_type),
            format!("{:?}", seq.mode),
            nanr.labels.get(i).map(String::as_str).unwrap_or("-"),
        );
        if verbose {
            for frame in &seq.frames {
                log::debug!("        {: >4} ticks {:?}", frame.duration, frame.data);
            }
        }
    }
}

pub fn inspect(args: Args) -> crate::Result<()> {
    let Args {
        input,
        format,
        test,
    } = args;
    let verbose = crate::is_log_level(log::LevelFilter::Debug);
    let data = std::fs::read(&input)?;
    log::info!("{}: {} bytes", input.display(), data.len());

    let mut checks: Vec<(&str, Vec<u8>)> = Vec::new();
    match format {
        Format::Ncgr => {
            let ncgr = Ncgr::unpack(&data)?;
            inspect_ncgr(&ncgr);
            if test {
                checks.push(("repack", ncgr.pack()?));
            }
        }
        Format::Nscr => {
            let nscr = Nscr::unpack(&data)?;
            inspect_nscr(&nscr);
            if test {
                checks.push(("repack", nscr.pack()?));
            }
        }
        Format::Nclr => {
            let nclr = Nclr::unpack(&data)?;
            inspect_nclr(&nclr);
            if test {
                checks.push(("repack", nclr.pack()?));
            }
        }
        Format::Ncer => {
            let ncer = Ncer::unpack(&data)?;
            inspect_ncer(&ncer, verbose);
            if test {
                checks.push(("repack", ncer.pack()?));
                let json = document::ncer_to_json(&ncer)?;
                checks.push(("JSON conversion", document::json_to_ncer(&json)?.pack()?));
            }
        }
        Format::Nanr => {
            let nanr = Nanr::unpack(&data)?;
            inspect_nanr(&nanr, verbose);
            if test {
                checks.push(("repack", nanr.pack()?));
                let json = document::nanr_to_json(&nanr)?;
                checks.push(("JSON conversion", document::json_to_nanr(&json)?.pack()?));
            }
        }
    }

    let mut failed = 0usize;
    for (what, converted) in &checks {
        let ok = test_conversion(what, &data, converted);
        log::info!("  TEST {what: <16} {}", if ok { "✓" } else { "FAIL" });
        failed += !ok as usize;
    }
    if failed > 0 {
        return Err(crate::Error::Value(format!(
            "{failed} of {} conversion tests failed",
            checks.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_is_reported() {
        assert!(test_conversion("x", b"abc", b"abc"));
        assert!(!test_conversion("x", b"abc", b"abd"));
        assert!(!test_conversion("x", b"abc", b"ab"));
    }

    #[test]
    fn inspect_tests_repack() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pal.NCLR");
        Nclr::monochrome().save_as(&path).unwrap();
        let args = Args {
            input: path.clone(),
            format: Format::Nclr,
            test: true,
        };
        inspect(args).unwrap();
        let args = Args {
            input: path,
            format: Format::Nanr,
            test: true,
        };
        assert!(matches!(inspect(args), Err(crate::Error::Format { .. })));
    }
}
