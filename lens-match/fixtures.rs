//! Synthetic sprites shared by the unit tests of this crate and, through
//! the `test-support` feature, of crates built on it.

use image::{DynamicImage, Rgba, RgbaImage};

/// 128x128 sprite of 8x8 cells with pseudo-random colours
pub fn textured_rgba(seed: u32) -> RgbaImage {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };

    let mut cells = Vec::with_capacity(16 * 16);
    for _ in 0..16 * 16 {
        let v = next();
        cells.push(Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, 255]));
    }

    RgbaImage::from_fn(128, 128, |x, y| cells[((y / 8) * 16 + x / 8) as usize])
}

pub fn textured_sprite(seed: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(textured_rgba(seed))
}

pub fn flat_sprite() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(128, 128, Rgba([90, 90, 90, 255])))
}
