use image::{Rgba, RgbaImage};

const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);

fn hline(image: &mut RgbaImage, y: u32, x0: u32, x1: u32) {
    for x in x0..=x1 {
        image.put_pixel(x, y, INK);
    }
}

fn vline(image: &mut RgbaImage, x: u32, y0: u32, y1: u32) {
    for y in y0..=y1 {
        image.put_pixel(x, y, INK);
    }
}

/// Glyph-like block of vertical bars covering x0..=x0+21, y0..=y0+6
fn text_block(image: &mut RgbaImage, x0: u32, y0: u32) {
    for x in (x0..=x0 + 21).step_by(3) {
        vline(image, x, y0, y0 + 6);
    }
}

/// Two-leaf rectangular cladogram rooted on the left, 140x100.
///
/// Root stem y=50 x10..=50, junction at x=50, leaves end at (90,30) and
/// (90,70) with a text block right of each leaf.
pub fn cladogram() -> RgbaImage {
    let mut image = RgbaImage::from_pixel(140, 100, PAPER);
    hline(&mut image, 50, 10, 50);
    vline(&mut image, 50, 30, 70);
    hline(&mut image, 30, 50, 90);
    hline(&mut image, 70, 50, 90);
    text_block(&mut image, 97, 27);
    text_block(&mut image, 97, 67);
    image
}

/// The cladogram with a short isolated stroke far from the tree
pub fn cladogram_with_speck() -> RgbaImage {
    let mut image = cladogram();
    hline(&mut image, 90, 115, 127);
    image
}

/// A comb: spine y=20 x20..=380 with teeth every 20 px hanging down to y=280
pub fn comb(width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, PAPER);
    hline(&mut image, 20, 20, width - 20);
    for x in (40..width - 20).step_by(20) {
        vline(&mut image, x, 21, height - 20);
    }
    image
}
