use anyhow::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::pipeline::{PipelineReport, RemovedPhoto};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }
}

/// One assignment row of the output table.
#[derive(Debug, Serialize)]
struct AssignmentRow<'a> {
    path: String,
    taken_at: Option<&'a str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    cluster: &'a str,
    category: &'a str,
}

/// One removed photo, with the cluster it was removed from.
#[derive(Debug, Serialize)]
struct RemovalRow<'a> {
    path: String,
    cluster: &'a str,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    assignments: Vec<AssignmentRow<'a>>,
    duplicates: Vec<RemovalRow<'a>>,
    blurry: Vec<RemovalRow<'a>>,
}

/// Write the pipeline report to `output_path`.
///
/// JSON produces a single document; CSV produces the assignment table at
/// `output_path` plus a sibling `<stem>_removed.csv` with both removal
/// lists. Returns the number of assignment rows written.
pub fn export_report(
    report: &PipelineReport,
    output_path: &Path,
    format: ExportFormat,
) -> Result<usize> {
    match format {
        ExportFormat::Json => export_json(report, output_path)?,
        ExportFormat::Csv => export_csv(report, output_path)?,
    }

    Ok(report.assignments.len())
}

fn assignment_row(assignment: &crate::pipeline::Assignment) -> AssignmentRow<'_> {
    AssignmentRow {
        path: assignment.path.display().to_string(),
        taken_at: assignment.taken_at.as_deref(),
        latitude: assignment.gps_latitude,
        longitude: assignment.gps_longitude,
        cluster: &assignment.cluster,
        category: &assignment.category,
    }
}

fn removal_rows(removed: &[RemovedPhoto]) -> Vec<RemovalRow<'_>> {
    removed
        .iter()
        .map(|r| RemovalRow {
            path: r.path.display().to_string(),
            cluster: &r.cluster,
            reason: r.reason.as_str(),
        })
        .collect()
}

fn export_json(report: &PipelineReport, output_path: &Path) -> Result<()> {
    let document = JsonReport {
        generated_at: chrono::Local::now().to_rfc3339(),
        assignments: report.assignments.iter().map(assignment_row).collect(),
        duplicates: removal_rows(&report.duplicates),
        blurry: removal_rows(&report.blurry),
    };

    let json = serde_json::to_string_pretty(&document)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(report: &PipelineReport, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record(["path", "taken_at", "latitude", "longitude", "cluster", "category"])?;
    for assignment in &report.assignments {
        let path = assignment.path.display().to_string();
        let latitude = assignment
            .gps_latitude
            .map(|v| v.to_string())
            .unwrap_or_default();
        let longitude = assignment
            .gps_longitude
            .map(|v| v.to_string())
            .unwrap_or_default();

        wtr.write_record([
            path.as_str(),
            assignment.taken_at.as_deref().unwrap_or(""),
            latitude.as_str(),
            longitude.as_str(),
            assignment.cluster.as_str(),
            assignment.category.as_str(),
        ])?;
    }
    wtr.flush()?;

    let removals = report.duplicates.iter().chain(report.blurry.iter());
    let mut wtr = csv::Writer::from_path(removals_path(output_path))?;
    wtr.write_record(["path", "cluster", "reason"])?;
    for removal in removals {
        let path = removal.path.display().to_string();
        wtr.write_record([
            path.as_str(),
            removal.cluster.as_str(),
            removal.reason.as_str(),
        ])?;
    }
    wtr.flush()?;

    Ok(())
}

fn removals_path(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "report".to_string());
    output_path.with_file_name(format!("{}_removed.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::RemovalReason;
    use crate::pipeline::Assignment;
    use tempfile::tempdir;

    fn sample_report() -> PipelineReport {
        PipelineReport {
            assignments: vec![Assignment {
                path: PathBuf::from("/photos/a.jpg"),
                taken_at: Some("2024:03:15 09:30:11".to_string()),
                gps_latitude: Some(43.2965),
                gps_longitude: Some(5.3698),
                cluster: "cluster_0".to_string(),
                category: "2024_03_15_Beach".to_string(),
            }],
            duplicates: vec![RemovedPhoto {
                path: PathBuf::from("/photos/b.jpg"),
                cluster: "cluster_0".to_string(),
                reason: RemovalReason::Duplicate,
            }],
            blurry: vec![],
            ..Default::default()
        }
    }

    #[test]
    fn test_csv_export_writes_both_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let count = export_report(&sample_report(), &path, ExportFormat::Csv).unwrap();
        assert_eq!(count, 1);

        let table = std::fs::read_to_string(&path).unwrap();
        assert!(table.contains("cluster_0"));
        assert!(table.contains("2024_03_15_Beach"));

        let removed = std::fs::read_to_string(dir.path().join("report_removed.csv")).unwrap();
        assert!(removed.contains("duplicate"));
    }

    #[test]
    fn test_json_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.json");

        export_report(&sample_report(), &path, ExportFormat::Json).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["assignments"][0]["category"], "2024_03_15_Beach");
        assert_eq!(json["duplicates"][0]["reason"], "duplicate");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("csv"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse("html"), None);
    }
}
