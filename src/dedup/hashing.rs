//! Perceptual hashing for near-duplicate detection.
//!
//! A DCT-preprocessed fingerprint robust to minor visual changes; two photos
//! whose hashes sit within a small Hamming distance are near-duplicates.

use anyhow::{anyhow, Result};
use image::DynamicImage;
use img_hash::{HasherConfig, ImageHash};

/// Fixed-width perceptual fingerprint.
pub type PerceptualHash = ImageHash<Box<[u8]>>;

/// Build the configured hasher. `hash_size` is the per-side bit dimension,
/// so 8 yields a 64-bit fingerprint.
pub fn build_hasher(hash_size: u32) -> img_hash::Hasher {
    HasherConfig::new()
        .hash_size(hash_size, hash_size)
        .preproc_dct()
        .to_hasher()
}

/// Hash one decoded image.
///
/// `img_hash` bundles its own `image` version, so pixels are handed over as
/// a raw RGBA buffer.
pub fn perceptual_hash(hasher: &img_hash::Hasher, img: &DynamicImage) -> Result<PerceptualHash> {
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let converted = img_hash::image::RgbaImage::from_raw(width, height, rgba.into_raw())
        .ok_or_else(|| anyhow!("Failed to create image for hashing"))?;

    Ok(hasher.hash_image(&img_hash::image::DynamicImage::ImageRgba8(converted)))
}

/// Hamming distance between two fingerprints.
pub fn hamming_distance(a: &PerceptualHash, b: &PerceptualHash) -> u32 {
    a.dist(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient_image(seed: u32) -> DynamicImage {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([
                ((x * 4 + seed) % 256) as u8,
                ((y * 4) % 256) as u8,
                ((x + y + seed) % 256) as u8,
            ])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_identical_images_have_zero_distance() {
        let hasher = build_hasher(8);
        let img = gradient_image(0);

        let a = perceptual_hash(&hasher, &img).unwrap();
        let b = perceptual_hash(&hasher, &img).unwrap();
        assert_eq!(hamming_distance(&a, &b), 0);
    }

    #[test]
    fn test_unrelated_images_are_distant() {
        let hasher = build_hasher(8);
        let gradient = perceptual_hash(&hasher, &gradient_image(0)).unwrap();

        let checker = RgbImage::from_fn(64, 64, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let checker = perceptual_hash(&hasher, &DynamicImage::ImageRgb8(checker)).unwrap();

        assert!(hamming_distance(&gradient, &checker) > 10);
    }

    #[test]
    fn test_hash_width_matches_configuration() {
        let hasher = build_hasher(8);
        let hash = perceptual_hash(&hasher, &gradient_image(0)).unwrap();
        // 8x8 bits = 8 bytes
        assert_eq!(hash.as_bytes().len(), 8);
    }
}
