//! Per-cluster duplicate and blur filtering.
//!
//! Runs after clustering and before categorization: each cluster's photos
//! are measured (sharpness + perceptual hash), near-duplicates are resolved
//! by quality, and whatever remains below the blur threshold is dropped.

pub mod hashing;
pub mod quality;

use image::imageops::FilterType;
use rayon::prelude::*;
use std::path::Path;

use crate::scanner::Photo;

pub use hashing::{build_hasher, hamming_distance, perceptual_hash, PerceptualHash};
pub use quality::sharpness;

/// Tunables for measurement and filtering.
#[derive(Debug, Clone, Copy)]
pub struct DedupParams {
    /// Hamming distance strictly below which two photos are near-duplicates.
    pub phash_threshold: u32,
    /// Sharpness a photo must strictly exceed to survive the blur filter.
    pub blur_threshold: f64,
    /// Canonical size photos are resized to before measuring.
    pub resize_width: u32,
    pub resize_height: u32,
    /// Per-side bit dimension of the perceptual hash.
    pub hash_size: u32,
}

/// One photo's measurements, carrying its index into the scanned photo list.
#[derive(Debug, Clone)]
pub struct Measured {
    pub photo: usize,
    pub quality: f64,
    pub hash: PerceptualHash,
}

/// Why a photo was removed from its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Duplicate,
    Blurry,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::Duplicate => "duplicate",
            RemovalReason::Blurry => "blurry",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Removal {
    pub photo: usize,
    pub reason: RemovalReason,
}

/// Result of cleaning one cluster.
#[derive(Debug, Clone, Default)]
pub struct CullOutcome {
    /// Unique, non-blurry photos in scan order. May be empty.
    pub retained: Vec<Measured>,
    pub removed: Vec<Removal>,
    /// Photos whose pixels could not be read; excluded from consideration
    /// entirely, appearing in neither list above.
    pub unreadable: usize,
}

/// Measure and filter one cluster's photos (`members` index into `photos`).
pub fn clean_cluster(photos: &[Photo], members: &[usize], params: &DedupParams) -> CullOutcome {
    let measured = measure_cluster(photos, members, params);
    let unreadable = members.len() - measured.len();
    let (retained, removed) = filter_duplicates(measured, params);

    CullOutcome {
        retained,
        removed,
        unreadable,
    }
}

/// Measure every readable photo in the cluster, preserving member order.
///
/// Unreadable photos are logged and skipped, leaving a silent gap: they take
/// no part in duplicate resolution.
pub fn measure_cluster(photos: &[Photo], members: &[usize], params: &DedupParams) -> Vec<Measured> {
    members
        .par_iter()
        .map(|&index| {
            let path = photos[index].path.as_path();
            match measure_photo(path, params) {
                Ok((quality, hash)) => Some(Measured {
                    photo: index,
                    quality,
                    hash,
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable photo");
                    None
                }
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

fn measure_photo(path: &Path, params: &DedupParams) -> anyhow::Result<(f64, PerceptualHash)> {
    let img = image::open(path)?;
    let canonical = img.resize_exact(params.resize_width, params.resize_height, FilterType::Triangle);

    let quality = sharpness(&canonical.to_luma8());

    let hasher = build_hasher(params.hash_size);
    let hash = perceptual_hash(&hasher, &canonical)?;

    Ok((quality, hash))
}

/// Resolve near-duplicates, then drop blurry survivors.
///
/// First-match semantics, deliberately: a photo is resolved against the
/// first unique photo within `phash_threshold` and compared no further.
/// Within a matched pair the higher-quality photo stays (replacing the
/// incumbent in place when the newcomer wins; ties keep the incumbent).
pub fn filter_duplicates(
    measured: Vec<Measured>,
    params: &DedupParams,
) -> (Vec<Measured>, Vec<Removal>) {
    let mut unique: Vec<Measured> = Vec::new();
    let mut removed: Vec<Removal> = Vec::new();

    for candidate in measured {
        let mut is_duplicate = false;

        for slot in unique.iter_mut() {
            let distance = hamming_distance(&candidate.hash, &slot.hash);
            if distance < params.phash_threshold {
                if candidate.quality > slot.quality {
                    tracing::debug!(
                        kept = candidate.photo,
                        dropped = slot.photo,
                        distance,
                        "duplicate resolved by quality"
                    );
                    removed.push(Removal {
                        photo: slot.photo,
                        reason: RemovalReason::Duplicate,
                    });
                    *slot = candidate.clone();
                } else {
                    tracing::debug!(
                        kept = slot.photo,
                        dropped = candidate.photo,
                        distance,
                        "duplicate resolved by quality"
                    );
                    removed.push(Removal {
                        photo: candidate.photo,
                        reason: RemovalReason::Duplicate,
                    });
                }
                is_duplicate = true;
                break;
            }
        }

        if !is_duplicate {
            unique.push(candidate);
        }
    }

    let mut retained = Vec::with_capacity(unique.len());
    for photo in unique {
        if photo.quality > params.blur_threshold {
            retained.push(photo);
        } else {
            tracing::debug!(photo = photo.photo, quality = photo.quality, "blurry photo dropped");
            removed.push(Removal {
                photo: photo.photo,
                reason: RemovalReason::Blurry,
            });
        }
    }

    (retained, removed)
}
