//! Bounded-window neighbor clustering over one day bucket.
//!
//! A single left-to-right pass, O(N·w): each anchor examines the next `w`
//! photos and accepts those similar enough. When the anchor and the last
//! photo of the window are themselves similar, the window is "bridged" and
//! every photo in it is accepted, letting a slowly drifting sequence (a walk
//! through changing scenery) merge into one cluster even though its two ends
//! are not directly similar.

use crate::embed::{dot, Embedding};

use super::ClusterId;

/// Tunables for the neighbor scan.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Minimum dot product (cosine similarity on unit vectors) for a
    /// neighbor to be accepted on its own.
    pub similarity_threshold: f32,
    /// Number of forward neighbors examined per anchor.
    pub window_size: usize,
}

/// One cluster, as indices into the bucket's photo list.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: ClusterId,
    pub members: Vec<usize>,
}

/// Outcome of clustering one bucket.
#[derive(Debug, Clone)]
pub struct BucketClusters {
    /// Clusters in creation order; the `others` cluster, if any, is last.
    pub clusters: Vec<Cluster>,
    /// Photos accepted only through bridging, below the pairwise threshold.
    /// Diagnostic only; membership is unaffected.
    pub outliers: Vec<usize>,
}

/// Cluster one day bucket of embeddings (indices `0..N-1`, scan order).
///
/// All scan state lives in this call; `next_cluster_id` is the run-global
/// monotonic counter owned by the caller. Must not be parallelized
/// internally: the accumulator and already-clustered set are scan-order
/// dependent.
pub fn cluster_bucket(
    embeddings: &[Embedding],
    params: &ClusterParams,
    next_cluster_id: &mut u64,
) -> BucketClusters {
    let n = embeddings.len();
    let threshold = params.similarity_threshold;

    let mut clusters: Vec<Cluster> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut clustered = vec![false; n];
    let mut outliers: Vec<usize> = Vec::new();
    let mut last_index_added: Option<usize> = None;

    for i in 0..n {
        let end = (i + params.window_size + 1).min(n);
        let (accepted, window_outliers) = scan_window(embeddings, i, end, threshold);

        if let Some(&first) = window_outliers.first() {
            tracing::debug!(anchor = i, outlier = first, "accepted through window bridge");
            outliers.push(first);
        }

        if !accepted.is_empty() && !clustered[i] {
            current.push(i);
            clustered[i] = true;
            last_index_added = Some(last_index_added.map_or(i, |last| last.max(i)));
        }

        for &j in &accepted {
            if !clustered[j] {
                current.push(j);
                clustered[j] = true;
                last_index_added = Some(last_index_added.map_or(j, |last| last.max(j)));
            }
        }

        // Nothing accepted at this anchor and no additions pending from an
        // earlier window: the accumulator is complete.
        if accepted.is_empty() && !current.is_empty() && last_index_added.is_some_and(|last| i >= last)
        {
            finalize(&mut clusters, &mut current, next_cluster_id);
        }
    }

    if !current.is_empty() {
        finalize(&mut clusters, &mut current, next_cluster_id);
    }

    let unclustered: Vec<usize> = (0..n).filter(|&i| !clustered[i]).collect();
    if !unclustered.is_empty() {
        clusters.push(Cluster {
            id: ClusterId::Others,
            members: unclustered,
        });
    }

    BucketClusters { clusters, outliers }
}

/// Examine the window `i+1..end` from anchor `i`.
///
/// Returns the accepted neighbor indices in window order, plus those
/// accepted only because the window was bridged.
fn scan_window(
    embeddings: &[Embedding],
    i: usize,
    end: usize,
    threshold: f32,
) -> (Vec<usize>, Vec<usize>) {
    let mut accepted = Vec::new();
    let mut outliers = Vec::new();

    // Bridge test: anchor vs the last photo in the window.
    let bridged = dot(&embeddings[i], &embeddings[end - 1]) >= threshold;

    for j in (i + 1)..end {
        let sim = dot(&embeddings[i], &embeddings[j]);
        if sim >= threshold {
            accepted.push(j);
        } else if bridged {
            accepted.push(j);
            outliers.push(j);
        }
    }

    (accepted, outliers)
}

fn finalize(clusters: &mut Vec<Cluster>, current: &mut Vec<usize>, next_cluster_id: &mut u64) {
    let id = ClusterId::Seq(*next_cluster_id);
    *next_cluster_id += 1;
    tracing::debug!(cluster = %id, size = current.len(), "cluster finalized");
    clusters.push(Cluster {
        id,
        members: std::mem::take(current),
    });
}
