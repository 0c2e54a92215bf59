//! Photo discovery and metadata scanning.
//!
//! Produces the ordered photo list the pipeline consumes: recursive
//! extension-filtered discovery, then per-photo EXIF extraction.

pub mod discovery;
pub mod metadata;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use discovery::discover_images;
pub use metadata::PhotoMetadata;

/// One discovered photo and the metadata the pipeline needs.
#[derive(Debug, Clone)]
pub struct Photo {
    pub path: PathBuf,
    /// Raw EXIF capture timestamp; `None` for undated photos.
    pub taken_at: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

/// Discover and scan every image under `directory`.
///
/// EXIF failures are not fatal: the photo is kept, undated. Only the
/// discovery walk itself can error.
pub fn scan_directory(directory: &Path, extensions: &[String]) -> Result<Vec<Photo>> {
    let paths = discover_images(directory, extensions)?;
    tracing::info!(directory = %directory.display(), count = paths.len(), "discovered images");

    let photos = paths
        .into_iter()
        .map(|path| {
            let metadata = match metadata::extract_metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "no readable metadata");
                    PhotoMetadata::default()
                }
            };
            Photo {
                path,
                taken_at: metadata.taken_at,
                gps_latitude: metadata.gps_latitude,
                gps_longitude: metadata.gps_longitude,
            }
        })
        .collect();

    Ok(photos)
}
