//! Difference-hash fingerprints.
//!
//! The image is reduced to a `(hash_size + 1) × hash_size` grayscale grid and
//! each bit records whether a pixel is darker than its right-hand neighbour.
//! The result is `hash_size²` bits long whatever the source resolution.

use image::imageops::FilterType;
use image::DynamicImage;
use vlens_models::Fingerprint;

/// Default grid size, giving a 64-bit fingerprint.
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Luminance in per-mille weights (ITU-R BT.601).
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u32 {
    (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000
}

/// Compute the difference hash of an image.
///
/// `hash_size` is clamped to at least 1.
pub fn dhash(image: &DynamicImage, hash_size: u32) -> Fingerprint {
    let hash_size = hash_size.max(1);
    let width = hash_size + 1;
    let height = hash_size;

    let small = image
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let gray: Vec<u32> = small
        .pixels()
        .map(|p| luma(p.0[0], p.0[1], p.0[2]))
        .collect();

    let bits = (0..height).flat_map(|y| {
        let row = &gray[(y * width) as usize..((y + 1) * width) as usize];
        (0..hash_size as usize).map(move |x| row[x] < row[x + 1])
    });

    Fingerprint::from_bits(bits)
}
