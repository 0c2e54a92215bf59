//! Semantic category assignment for clusters.
//!
//! A cluster's retained photos are summarized by their embedding centroid,
//! which is scored against a fixed taxonomy of reference vectors. The
//! highest-scoring category names the cluster, with two corrections: the
//! catch-all fallback loses to a close runner-up, and a singleton cluster is
//! never trusted enough to leave the fallback folder.

use anyhow::{bail, Result};

use crate::cluster::DayKey;
use crate::embed::{dot, normalize, Embedding, TextEmbedder};

/// The designated catch-all label.
pub const FALLBACK_LABEL: &str = "Other";

/// Spread below which min-max normalization of scores is skipped.
const SCORE_SPREAD_EPSILON: f32 = 1e-8;

/// One taxonomy entry: a label and its unit-normalized reference vector.
#[derive(Debug, Clone)]
pub struct Category {
    pub label: String,
    pub embedding: Embedding,
}

/// Fixed, ordered set of categories with exactly one fallback.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Vec<Category>,
    fallback: usize,
}

/// Built-in category set with the CLIP prompt each label is encoded from.
/// Prompts are richer than the bare labels; CLIP matches full phrases
/// better than single words.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("City", "City urban buildings"),
    ("Beach", "Beach sea ocean sand"),
    ("Hiking", "Hiking trail forest path"),
    ("Sport", "Sports activity athletic"),
    ("Museum", "Museum exhibition art gallery"),
    ("Food", "Food cuisine meal"),
    ("Restaurant", "Restaurant dining food"),
    ("Travel", "Travel vacation trip"),
    ("Nature", "Nature wildlife water flora fauna"),
    ("Snow", "Snow winter cold"),
    ("Friends", "Family friends gathering"),
    ("Games", "Games entertainment fun"),
    ("Animals", "Animals pets wildlife"),
    (FALLBACK_LABEL, "miscellaneous computer screenshots"),
];

impl Taxonomy {
    /// Build from preconstructed categories. Exactly one entry must carry
    /// the fallback label.
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        let fallback_positions: Vec<usize> = categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.label == FALLBACK_LABEL)
            .map(|(i, _)| i)
            .collect();

        match fallback_positions.as_slice() {
            [index] => Ok(Self {
                categories,
                fallback: *index,
            }),
            [] => bail!("taxonomy has no '{}' fallback category", FALLBACK_LABEL),
            _ => bail!("taxonomy has more than one '{}' category", FALLBACK_LABEL),
        }
    }

    /// Encode the given `(label, prompt)` pairs through the text embedder.
    pub fn from_prompts(entries: &[(&str, &str)], embedder: &dyn TextEmbedder) -> Result<Self> {
        let prompts: Vec<&str> = entries.iter().map(|(_, prompt)| *prompt).collect();
        let embeddings = embedder.embed_texts(&prompts)?;

        let categories = entries
            .iter()
            .zip(embeddings)
            .map(|((label, _), embedding)| Category {
                label: label.to_string(),
                embedding,
            })
            .collect();

        Self::new(categories)
    }

    /// Encode the built-in category set.
    pub fn builtin(embedder: &dyn TextEmbedder) -> Result<Self> {
        Self::from_prompts(DEFAULT_CATEGORIES, embedder)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// A cluster's resolved category and composed label.
#[derive(Debug, Clone)]
pub struct ClusterLabel {
    /// Resolved category name (post fallback disambiguation).
    pub category: String,
    /// The resolved category's score (normalized when normalization ran).
    pub score: f32,
    /// Final label: `<day>_<category>` or `Other/<category>`.
    pub label: String,
}

/// Mean of the member embeddings, rescaled to unit length.
///
/// A zero-norm mean (opposing vectors) is returned as-is; downstream
/// scoring then degenerates to uniform zeros, which the epsilon rule
/// handles.
pub fn centroid(members: &[&Embedding]) -> Embedding {
    let dim = members.first().map_or(0, |e| e.len());
    let mut mean = vec![0.0f32; dim];

    for member in members {
        for (acc, value) in mean.iter_mut().zip(member.iter()) {
            *acc += value;
        }
    }
    for value in mean.iter_mut() {
        *value /= members.len() as f32;
    }

    normalize(&mut mean);
    mean
}

/// Categorize one cluster from its retained members' embeddings.
///
/// Returns `None` for an empty cluster: nothing retained, nothing to label.
pub fn categorize_cluster(
    taxonomy: &Taxonomy,
    members: &[&Embedding],
    day: &DayKey,
    disambiguation_gap: f32,
) -> Option<ClusterLabel> {
    if members.is_empty() {
        return None;
    }

    let center = centroid(members);
    let mut scores: Vec<f32> = taxonomy
        .categories
        .iter()
        .map(|c| dot(&center, &c.embedding))
        .collect();

    // Min-max normalize unless the scores are near-uniform; dividing by a
    // ~0 spread would blow up.
    let max = scores.iter().cloned().fold(f32::MIN, f32::max);
    let min = scores.iter().cloned().fold(f32::MAX, f32::min);
    if max - min > SCORE_SPREAD_EPSILON {
        for score in scores.iter_mut() {
            *score = (*score - min) / (max - min);
        }
    }

    let mut best = argmax(&scores)?;

    // The catch-all wins too easily: when a concrete category is close
    // behind, prefer it.
    if best == taxonomy.fallback {
        if let Some(second) = argmax_excluding(&scores, best) {
            if scores[best] - scores[second] <= disambiguation_gap {
                tracing::debug!(
                    runner_up = %taxonomy.categories[second].label,
                    gap = scores[best] - scores[second],
                    "fallback displaced by runner-up"
                );
                best = second;
            }
        }
    }

    let category = taxonomy.categories[best].label.clone();
    let score = scores[best];

    // One photo is too weak a signal to commit to a day album.
    let singleton = members.len() == 1;
    let label = if best == taxonomy.fallback || singleton {
        format!("{}/{}", FALLBACK_LABEL, category)
    } else {
        format!("{}_{}", day.label_text(), category)
    };

    Some(ClusterLabel {
        category,
        score,
        label,
    })
}

/// Index of the highest score; ties resolve to the lowest index.
fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &score) in scores.iter().enumerate() {
        if best.map_or(true, |b| score > scores[b]) {
            best = Some(i);
        }
    }
    best
}

fn argmax_excluding(scores: &[f32], excluded: usize) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &score) in scores.iter().enumerate() {
        if i == excluded {
            continue;
        }
        if best.map_or(true, |b| score > scores[b]) {
            best = Some(i);
        }
    }
    best
}
