use nitrogfx::{convert, gfx::IndexedImage, ncgr::BitDepth, NitroFile, Ncgr, Nclr, Nscr};
use rgb::RGB8;

/// 256x128 raster built from a handful of tile patterns, some of them flipped.
fn raster() -> IndexedImage {
    let mut palette: Vec<RGB8> = (0..=255u8).map(|i| RGB8::new(i, 255 - i, i / 2)).collect();
    palette[1] = RGB8::new(255, 0, 0);
    let mut img = IndexedImage::new(256, 128, palette);
    for y in 0..128 {
        for x in 0..256 {
            let (tx, ty) = (x / 8, y / 8);
            let (mut lx, mut ly) = (x % 8, y % 8);
            if (tx + ty) % 3 == 1 {
                lx = 7 - lx;
            }
            if tx % 4 == 2 {
                ly = 7 - ly;
            }
            let pattern = (tx * 5 + ty * 3) % 7;
            img.set_pixel(x, y, (lx * 8 + ly + pattern * 37) as u8 % 251);
        }
    }
    img
}

#[test]
fn palette_is_read_from_raster() {
    let nclr = convert::raster_to_palette(&raster());
    assert_eq!(nclr.colors.len(), 256);
    assert_eq!(nclr.colors[1], RGB8::new(255, 0, 0));
    assert!(nclr.is8bpp);
}

#[test]
fn tilemap_roundtrips_through_png() {
    let img = raster();
    let (ncgr1, nscr1, nclr1) = convert::raster_to_triple(&img).unwrap();
    assert_eq!(ncgr1.bpp, BitDepth::Eight);
    assert_eq!((nscr1.width, nscr1.height), (256, 128));
    assert_eq!(nscr1.map.len(), 32 * 16);
    assert!(ncgr1.tiles.len() <= 7, "{} tiles", ncgr1.tiles.len());
    assert!(nscr1.map.iter().any(|e| e.xflip));
    assert!(nscr1.map.iter().any(|e| e.yflip));

    let drawn = convert::triple_to_raster(&ncgr1, &nscr1, &nclr1).unwrap();
    assert_eq!(drawn, img);

    let png = drawn.write_png().unwrap();
    let reread = IndexedImage::read_png(&png).unwrap();
    let (ncgr2, nscr2, nclr2) = convert::raster_to_triple(&reread).unwrap();
    assert_eq!(ncgr1, ncgr2);
    assert_eq!(nscr1, nscr2);
    assert_eq!(nclr1, nclr2);
}

#[test]
fn triple_survives_binary_roundtrip() {
    let (ncgr, nscr, nclr) = convert::raster_to_triple(&raster()).unwrap();
    let ncgr_bytes = ncgr.pack().unwrap();
    let nscr_bytes = nscr.pack().unwrap();
    let nclr_bytes = nclr.pack().unwrap();
    let ncgr2 = Ncgr::unpack(&ncgr_bytes).unwrap();
    let nscr2 = Nscr::unpack(&nscr_bytes).unwrap();
    let nclr2 = Nclr::unpack(&nclr_bytes).unwrap();
    assert_eq!(ncgr2, ncgr);
    assert_eq!(nscr2, nscr);
    assert_eq!(nclr2.colors[1], RGB8::new(248, 0, 0));
    assert_eq!(ncgr2.pack().unwrap(), ncgr_bytes);
    assert_eq!(nscr2.pack().unwrap(), nscr_bytes);
    assert_eq!(nclr2.pack().unwrap(), nclr_bytes);
}

#[test]
fn tileset_png_roundtrip() {
    let (ncgr, _, nclr) = convert::raster_to_triple(&raster()).unwrap();
    let img = convert::tileset_to_raster(&ncgr, &nclr);
    let png = img.write_png().unwrap();
    let reread = IndexedImage::read_png(&png).unwrap();
    assert_eq!(convert::raster_to_tileset(&reread, BitDepth::Eight).unwrap(), ncgr);
}

#[test]
fn jasc_roundtrip_keeps_full_precision() {
    let nclr = convert::raster_to_palette(&raster());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pal.pal");
    std::fs::write(&path, convert::write_jasc(&nclr)).unwrap();
    let back = convert::read_jasc(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(back, nclr);
}
