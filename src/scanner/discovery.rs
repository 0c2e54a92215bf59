//! Recursive image discovery.

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collect every image file under `directory`, filtered by extension.
///
/// Paths come back sorted, so the discovery order (and everything downstream
/// keyed on it, like cluster ids) is stable across runs.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = WalkDir::new(directory)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter(|entry| has_image_extension(entry.path(), extensions))
        .map(|entry| entry.into_path())
        .collect();

    images.sort();

    Ok(images)
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| e.to_lowercase() == ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_discovery_filters_and_recurses() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("photo1.jpg")).unwrap();
        File::create(dir.path().join("photo2.PNG")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        fs::create_dir(dir.path().join("holiday")).unwrap();
        File::create(dir.path().join("holiday/photo3.jpeg")).unwrap();

        let extensions = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];
        let images = discover_images(dir.path(), &extensions).unwrap();

        assert_eq!(images.len(), 3);
    }

    #[test]
    fn test_discovery_order_is_stable() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("b.jpg")).unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();
        File::create(dir.path().join("c.jpg")).unwrap();

        let extensions = vec!["jpg".to_string()];
        let first = discover_images(dir.path(), &extensions).unwrap();
        let second = discover_images(dir.path(), &extensions).unwrap();

        assert_eq!(first, second);
        let names: Vec<_> = first
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg", "c.jpg"]);
    }
}
