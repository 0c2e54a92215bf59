mod categorize;
mod cluster;
mod config;
mod dedup;
mod embed;
mod export;
mod logging;
mod pipeline;
mod scanner;

use anyhow::{bail, Result};
use std::path::PathBuf;

use categorize::Taxonomy;
use config::Config;
use embed::ClipEncoder;
use export::ExportFormat;

struct Args {
    directory: PathBuf,
    config_path: Option<PathBuf>,
    output: PathBuf,
    format: ExportFormat,
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().collect();

    let mut directory = None;
    let mut config_path = None;
    let mut output = None;
    let mut format = ExportFormat::Csv;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("photosort {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    bail!("--config requires a path argument");
                }
            }
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    output = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    bail!("--output requires a path argument");
                }
            }
            "--format" | "-f" => {
                if i + 1 < args.len() {
                    format = match ExportFormat::parse(&args[i + 1]) {
                        Some(format) => format,
                        None => bail!("unknown format '{}', expected csv or json", args[i + 1]),
                    };
                    i += 1;
                } else {
                    bail!("--format requires csv or json");
                }
            }
            other if !other.starts_with('-') && directory.is_none() => {
                directory = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(directory) = directory else {
        print_help();
        std::process::exit(1);
    };

    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("photosort_report.{}", format.extension())));

    Ok(Args {
        directory,
        config_path,
        output,
        format,
    })
}

fn print_help() {
    println!(
        r#"photosort - sort a photo collection into day-scoped, categorized albums

USAGE:
    photosort [OPTIONS] DIRECTORY

OPTIONS:
    --config, -c PATH   Path to config file
    --output, -o PATH   Report output path (default: photosort_report.csv)
    --format, -f FMT    Report format: csv or json (default: csv)
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    PHOTOSORT_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/photosort/config.toml"#
    );
}

fn main() -> Result<()> {
    let args = parse_args()?;

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(None);

    let config = match &args.config_path {
        Some(path) => Config::load_from(path.clone())?,
        None => Config::load()?,
    };

    let photos = scanner::scan_directory(&args.directory, &config.scanner.image_extensions)?;
    if photos.is_empty() {
        println!("No images found under {}", args.directory.display());
        return Ok(());
    }

    let encoder = ClipEncoder::load(config.embedder.models_dir.clone())?;
    let taxonomy = Taxonomy::builtin(&encoder)?;
    tracing::info!(categories = taxonomy.len(), "taxonomy encoded");

    let report = pipeline::run(&photos, &encoder, &taxonomy, &config.pipeline_params());

    let written = export::export_report(&report, &args.output, args.format)?;

    println!(
        "Sorted {} photos into {} clusters across {} days",
        report.stats.photos, report.stats.clusters, report.stats.buckets
    );
    println!(
        "  assigned: {}  duplicates: {}  blurry: {}  unreadable: {}  bridge outliers: {}",
        written,
        report.duplicates.len(),
        report.blurry.len(),
        report.stats.unreadable,
        report.stats.outliers
    );
    if report.stats.buckets_skipped > 0 {
        println!(
            "  {} day bucket(s) skipped (no embeddings)",
            report.stats.buckets_skipped
        );
    }
    println!("Report written to {}", args.output.display());

    Ok(())
}
