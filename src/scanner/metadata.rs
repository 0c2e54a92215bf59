//! EXIF extraction: capture timestamp and GPS position.
//!
//! Only the fields the pipeline actually consumes are read. A photo with no
//! EXIF block (screenshots, downloads) yields all-`None` metadata and flows
//! through as undated.

use anyhow::Result;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct PhotoMetadata {
    /// Raw EXIF timestamp, e.g. `"2024:03:15 09:30:11"`.
    pub taken_at: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
}

pub fn extract_metadata(path: &Path) -> Result<PhotoMetadata> {
    let mut metadata = PhotoMetadata::default();

    let file = File::open(path)?;
    let mut bufreader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => exif,
        Err(_) => return Ok(metadata),
    };

    // Prefer the original capture time over the file-modification variant.
    metadata.taken_at = [exif::Tag::DateTimeOriginal, exif::Tag::DateTime]
        .iter()
        .find_map(|&tag| exif.get_field(tag, exif::In::PRIMARY))
        .map(|field| field.display_value().to_string().trim_matches('"').to_string());

    if let (Some(lat), Some(lon)) = (
        read_coordinate(&exif, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef, 'S'),
        read_coordinate(&exif, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef, 'W'),
    ) {
        metadata.gps_latitude = Some(lat);
        metadata.gps_longitude = Some(lon);
    }

    Ok(metadata)
}

/// Read one GPS axis as decimal degrees, negated for the given hemisphere.
fn read_coordinate(
    exif: &exif::Exif,
    value_tag: exif::Tag,
    ref_tag: exif::Tag,
    negative_hemisphere: char,
) -> Option<f64> {
    let field = exif.get_field(value_tag, exif::In::PRIMARY)?;
    let reference = exif.get_field(ref_tag, exif::In::PRIMARY)?;

    let exif::Value::Rational(ref dms) = field.value else {
        return None;
    };
    if dms.len() < 3 {
        return None;
    }

    let degrees = dms[0].num as f64 / dms[0].denom as f64;
    let minutes = dms[1].num as f64 / dms[1].denom as f64;
    let seconds = dms[2].num as f64 / dms[2].denom as f64;
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;

    if reference
        .display_value()
        .to_string()
        .contains(negative_hemisphere)
    {
        Some(-decimal)
    } else {
        Some(decimal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn test_image_without_exif_yields_empty_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.png");
        RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])).save(&path).unwrap();

        let metadata = extract_metadata(&path).unwrap();
        assert!(metadata.taken_at.is_none());
        assert!(metadata.gps_latitude.is_none());
        assert!(metadata.gps_longitude.is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(extract_metadata(Path::new("/nonexistent/photo.jpg")).is_err());
    }
}
