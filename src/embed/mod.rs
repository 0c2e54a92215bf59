//! Embedding capability layer.
//!
//! The clustering and categorization engine consumes unit-normalized
//! vectors through the traits below and never names a concrete model;
//! `clip` provides the ONNX-backed implementation used by the binary.

mod clip;

pub use clip::ClipEncoder;

use std::path::PathBuf;
use thiserror::Error;

/// Unit-normalized embedding vector (512-dimensional for CLIP ViT-B/32).
pub type Embedding = Vec<f32>;

/// Errors at the embedding-provider boundary.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("failed to read image {path}: {message}")]
    ImageRead { path: String, message: String },

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Produces one unit-normalized vector per image, preserving input order.
///
/// A batch either succeeds for every image or fails as a whole; callers
/// treat a failed batch as "no embeddings for this set of photos".
pub trait ImageEmbedder {
    fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Embedding>, EmbedError>;
}

/// Produces one unit-normalized vector per text prompt, preserving input order.
pub trait TextEmbedder {
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError>;
}

/// Dot product of two vectors of equal length.
///
/// On unit-normalized inputs this equals cosine similarity. Mismatched or
/// empty inputs score 0.0 rather than erroring.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scale a vector to unit length in place. Zero vectors are left unchanged.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
