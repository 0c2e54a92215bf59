//! CLIP ViT-B/32 encoder backed by ONNX Runtime.
//!
//! Visual and text encoders are downloaded once into the user's data
//! directory and run locally. Outputs are L2-normalized so the engine can
//! use plain dot products as cosine similarity.

use image::DynamicImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{EmbedError, Embedding, ImageEmbedder, TextEmbedder};

/// CLIP input resolution.
const INPUT_SIZE: u32 = 224;

/// CLIP text context length.
const CONTEXT_LENGTH: usize = 77;

// Qdrant's ONNX exports of CLIP ViT-B/32.
const VISUAL_MODEL_FILE: &str = "clip-vit-b32-vision.onnx";
const VISUAL_MODEL_URL: &str =
    "https://huggingface.co/Qdrant/clip-ViT-B-32-vision/resolve/main/model.onnx";
const TEXT_MODEL_FILE: &str = "clip-vit-b32-text.onnx";
const TEXT_MODEL_URL: &str =
    "https://huggingface.co/Qdrant/clip-ViT-B-32-text/resolve/main/model.onnx";

/// CLIP encoder owning both ONNX sessions.
///
/// Sessions require exclusive access to run, so each sits behind a mutex
/// and the encoder itself can be shared by reference.
pub struct ClipEncoder {
    visual: Mutex<Session>,
    text: Mutex<Session>,
}

impl ClipEncoder {
    /// Load both encoders, downloading the model files on first use.
    ///
    /// `models_dir` overrides the default cache location under the user's
    /// local data directory.
    pub fn load(models_dir: Option<PathBuf>) -> Result<Self, EmbedError> {
        let models_dir = match models_dir {
            Some(dir) => dir,
            None => default_models_dir()?,
        };
        std::fs::create_dir_all(&models_dir)
            .map_err(|e| EmbedError::ModelLoad(format!("{}: {}", models_dir.display(), e)))?;

        let visual_path = ensure_model(&models_dir, VISUAL_MODEL_FILE, VISUAL_MODEL_URL)?;
        let text_path = ensure_model(&models_dir, TEXT_MODEL_FILE, TEXT_MODEL_URL)?;

        Ok(Self {
            visual: Mutex::new(build_session(&visual_path)?),
            text: Mutex::new(build_session(&text_path)?),
        })
    }

    /// Encode a single decoded image.
    pub fn embed_image(&self, img: &DynamicImage) -> Result<Embedding, EmbedError> {
        let mut session = self
            .visual
            .lock()
            .map_err(|e| EmbedError::Inference(format!("visual session poisoned: {}", e)))?;
        run_visual_encoder(&mut session, img)
    }
}

impl ImageEmbedder for ClipEncoder {
    fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Embedding>, EmbedError> {
        let mut embeddings = Vec::with_capacity(paths.len());
        for path in paths {
            let img = image::open(path).map_err(|e| EmbedError::ImageRead {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            embeddings.push(self.embed_image(&img)?);
        }
        Ok(embeddings)
    }
}

impl TextEmbedder for ClipEncoder {
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
        let mut session = self
            .text
            .lock()
            .map_err(|e| EmbedError::Inference(format!("text session poisoned: {}", e)))?;

        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(run_text_encoder(&mut session, text)?);
        }
        Ok(embeddings)
    }
}

fn default_models_dir() -> Result<PathBuf, EmbedError> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| EmbedError::ModelLoad("could not find local data directory".into()))?;
    Ok(data_dir.join("photosort").join("models"))
}

/// Download a model file if it doesn't exist yet.
fn ensure_model(models_dir: &Path, filename: &str, url: &str) -> Result<PathBuf, EmbedError> {
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, "Downloading CLIP model...");
        let response = ureq::get(url)
            .call()
            .map_err(|e| EmbedError::ModelLoad(format!("download {}: {}", filename, e)))?;

        let mut file = std::fs::File::create(&model_path)
            .map_err(|e| EmbedError::ModelLoad(format!("create {}: {}", model_path.display(), e)))?;
        std::io::copy(&mut response.into_reader(), &mut file)
            .map_err(|e| EmbedError::ModelLoad(format!("write {}: {}", model_path.display(), e)))?;
        tracing::info!(model = %filename, path = ?model_path, "CLIP model downloaded");
    }

    Ok(model_path)
}

fn build_session(model_path: &Path) -> Result<Session, EmbedError> {
    (|| -> Result<Session, ort::Error> {
        Ok(Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?)
    })()
    .map_err(|e| EmbedError::ModelLoad(format!("{}: {}", model_path.display(), e)))
}

fn run_visual_encoder(session: &mut Session, img: &DynamicImage) -> Result<Embedding, EmbedError> {
    let resized = img.resize_exact(INPUT_SIZE, INPUT_SIZE, image::imageops::FilterType::Triangle);
    let rgb = resized.to_rgb8();

    // CLIP normalization constants (ImageNet stats)
    let mean = [0.48145466, 0.4578275, 0.40821073];
    let std = [0.26862954, 0.26130258, 0.27577711];

    let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
    let mut input_data = vec![0.0f32; 3 * plane];

    for y in 0..INPUT_SIZE as usize {
        for x in 0..INPUT_SIZE as usize {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            let idx = y * INPUT_SIZE as usize + x;

            for c in 0..3 {
                input_data[c * plane + idx] = ((pixel[c] as f32 / 255.0) - mean[c]) / std[c];
            }
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_SIZE as usize, INPUT_SIZE as usize],
        input_data.into_boxed_slice(),
    ))
    .map_err(|e| EmbedError::Inference(e.to_string()))?;

    let outputs = session
        .run(ort::inputs!["pixel_values" => input_tensor])
        .map_err(|e| EmbedError::Inference(e.to_string()))?;

    extract_normalized(&outputs)
}

fn run_text_encoder(session: &mut Session, text: &str) -> Result<Embedding, EmbedError> {
    let tokens = simple_tokenize(text);

    let mut input_ids = vec![49406i64]; // Start token
    input_ids.extend(tokens.iter().take(CONTEXT_LENGTH - 2).cloned());
    input_ids.push(49407); // End token
    input_ids.resize(CONTEXT_LENGTH, 0);

    let input_tensor = Tensor::from_array(([1usize, CONTEXT_LENGTH], input_ids.into_boxed_slice()))
        .map_err(|e| EmbedError::Inference(e.to_string()))?;

    let outputs = session
        .run(ort::inputs!["input_ids" => input_tensor])
        .map_err(|e| EmbedError::Inference(e.to_string()))?;

    extract_normalized(&outputs)
}

/// Pull the first output tensor and L2-normalize it.
fn extract_normalized(outputs: &ort::session::SessionOutputs) -> Result<Embedding, EmbedError> {
    let output = outputs
        .iter()
        .next()
        .ok_or_else(|| EmbedError::Inference("no embedding output".into()))?;

    let (_shape, data) = output
        .1
        .try_extract_tensor::<f32>()
        .map_err(|e| EmbedError::Inference(e.to_string()))?;

    let mut embedding: Embedding = data.to_vec();
    super::normalize(&mut embedding);
    Ok(embedding)
}

/// Simple tokenization for common words (placeholder - real CLIP uses BPE
/// with a specific vocabulary).
fn simple_tokenize(text: &str) -> Vec<i64> {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .take(CONTEXT_LENGTH - 2)
        .map(|c| c as i64)
        .collect()
}
