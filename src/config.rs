use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::cluster::ClusterParams;
use crate::dedup::DedupParams;
use crate::pipeline::PipelineParams;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "webp".to_string(),
    ]
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cosine similarity a neighbor must reach to join the anchor's cluster.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Forward neighbors examined per anchor.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Hamming distance below which two photos count as near-duplicates.
    #[serde(default = "default_phash_threshold")]
    pub phash_threshold: u32,

    /// Sharpness (Laplacian variance) a photo must exceed to survive.
    #[serde(default = "default_blur_threshold")]
    pub blur_threshold: f64,

    /// Score gap within which a runner-up category displaces "Other".
    #[serde(default = "default_disambiguation_gap")]
    pub disambiguation_gap: f32,

    /// Canonical size photos are resized to before quality/hash measurement.
    #[serde(default = "default_resize_dimension")]
    pub resize_width: u32,

    #[serde(default = "default_resize_dimension")]
    pub resize_height: u32,

    /// Per-side bit dimension of the perceptual hash (8 = 64-bit).
    #[serde(default = "default_hash_size")]
    pub hash_size: u32,
}

fn default_similarity_threshold() -> f32 {
    0.55
}

fn default_window_size() -> usize {
    3
}

fn default_phash_threshold() -> u32 {
    20
}

fn default_blur_threshold() -> f64 {
    50.0
}

fn default_disambiguation_gap() -> f32 {
    0.05
}

fn default_resize_dimension() -> u32 {
    600
}

fn default_hash_size() -> u32 {
    8
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            window_size: default_window_size(),
            phash_threshold: default_phash_threshold(),
            blur_threshold: default_blur_threshold(),
            disambiguation_gap: default_disambiguation_gap(),
            resize_width: default_resize_dimension(),
            resize_height: default_resize_dimension(),
            hash_size: default_hash_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbedderConfig {
    /// Where CLIP model files are cached. Defaults to the local data dir.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    pub fn load_from(config_path: PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("photosort")
            .join("config.toml")
    }

    /// Engine parameters derived from this config.
    pub fn pipeline_params(&self) -> PipelineParams {
        PipelineParams {
            cluster: ClusterParams {
                similarity_threshold: self.pipeline.similarity_threshold,
                window_size: self.pipeline.window_size,
            },
            dedup: DedupParams {
                phash_threshold: self.pipeline.phash_threshold,
                blur_threshold: self.pipeline.blur_threshold,
                resize_width: self.pipeline.resize_width,
                resize_height: self.pipeline.resize_height,
                hash_size: self.pipeline.hash_size,
            },
            disambiguation_gap: self.pipeline.disambiguation_gap,
        }
    }
}
