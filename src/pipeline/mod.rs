//! The sorting pipeline: Partition -> Embed -> Cluster -> Dedup -> Categorize.
//!
//! Owns the run-global cluster-id counter and the assignment table. Every
//! failure mode here is skip-and-continue; a run always produces a report.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::categorize::{categorize_cluster, Taxonomy};
use crate::cluster::{cluster_bucket, partition_by_day, ClusterParams};
use crate::dedup::{clean_cluster, DedupParams, RemovalReason};
use crate::embed::{Embedding, ImageEmbedder};
use crate::scanner::Photo;

/// All engine tunables in one place.
#[derive(Debug, Clone, Copy)]
pub struct PipelineParams {
    pub cluster: ClusterParams,
    pub dedup: DedupParams,
    /// Score gap within which a runner-up category displaces the fallback.
    pub disambiguation_gap: f32,
}

/// One row of the externally visible output table.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: PathBuf,
    pub taken_at: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    /// `cluster_<n>` or `others`.
    pub cluster: String,
    /// Final composed label, `<day>_<category>` or `Other/<category>`.
    pub category: String,
}

/// A photo removed during per-cluster cleaning.
#[derive(Debug, Clone)]
pub struct RemovedPhoto {
    pub path: PathBuf,
    pub cluster: String,
    pub reason: RemovalReason,
}

/// Counters for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub photos: usize,
    pub buckets: usize,
    pub buckets_skipped: usize,
    pub clusters: usize,
    pub outliers: usize,
    pub unreadable: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub assignments: Vec<Assignment>,
    pub duplicates: Vec<RemovedPhoto>,
    pub blurry: Vec<RemovedPhoto>,
    pub stats: RunStats,
}

/// Run the full engine over an ordered photo list.
///
/// Embedding for a bucket completes before that bucket is clustered; a
/// missing or failed batch skips the bucket (its photos get no cluster and
/// no category) and the run continues.
pub fn run(
    photos: &[Photo],
    embedder: &dyn ImageEmbedder,
    taxonomy: &Taxonomy,
    params: &PipelineParams,
) -> PipelineReport {
    let mut report = PipelineReport::default();
    report.stats.photos = photos.len();

    let buckets = partition_by_day(photos);
    report.stats.buckets = buckets.len();

    let mut next_cluster_id: u64 = 0;

    for bucket in &buckets {
        let paths: Vec<PathBuf> = bucket
            .photos
            .iter()
            .map(|&index| photos[index].path.clone())
            .collect();

        let embeddings = match embedder.embed_images(&paths) {
            Ok(embeddings) if embeddings.len() == paths.len() && !embeddings.is_empty() => {
                embeddings
            }
            Ok(_) => {
                tracing::warn!(day = ?bucket.key, "empty or misaligned embedding batch, skipping bucket");
                report.stats.buckets_skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(day = ?bucket.key, error = %e, "embedding failed, skipping bucket");
                report.stats.buckets_skipped += 1;
                continue;
            }
        };

        process_bucket(
            photos,
            bucket,
            &embeddings,
            taxonomy,
            params,
            &mut next_cluster_id,
            &mut report,
        );
    }

    tracing::info!(
        photos = report.stats.photos,
        buckets = report.stats.buckets,
        clusters = report.stats.clusters,
        assigned = report.assignments.len(),
        duplicates = report.duplicates.len(),
        blurry = report.blurry.len(),
        "pipeline finished"
    );

    report
}

fn process_bucket(
    photos: &[Photo],
    bucket: &crate::cluster::DayBucket,
    embeddings: &[Embedding],
    taxonomy: &Taxonomy,
    params: &PipelineParams,
    next_cluster_id: &mut u64,
    report: &mut PipelineReport,
) {
    let outcome = cluster_bucket(embeddings, &params.cluster, next_cluster_id);
    report.stats.clusters += outcome.clusters.len();
    report.stats.outliers += outcome.outliers.len();

    // Bucket-local index of each photo, for looking embeddings back up
    // after dedup hands us global indices.
    let local_of: HashMap<usize, usize> = bucket
        .photos
        .iter()
        .enumerate()
        .map(|(local, &global)| (global, local))
        .collect();

    for cluster in &outcome.clusters {
        let cluster_name = cluster.id.to_string();
        let members: Vec<usize> = cluster.members.iter().map(|&l| bucket.photos[l]).collect();

        let cull = clean_cluster(photos, &members, &params.dedup);
        report.stats.unreadable += cull.unreadable;

        for removal in &cull.removed {
            let removed = RemovedPhoto {
                path: photos[removal.photo].path.clone(),
                cluster: cluster_name.clone(),
                reason: removal.reason,
            };
            match removal.reason {
                RemovalReason::Duplicate => report.duplicates.push(removed),
                RemovalReason::Blurry => report.blurry.push(removed),
            }
        }

        // Empty retained set: the cluster contributes nothing.
        let member_embeddings: Vec<&Embedding> = cull
            .retained
            .iter()
            .map(|m| &embeddings[local_of[&m.photo]])
            .collect();

        if let Some(choice) = categorize_cluster(
            taxonomy,
            &member_embeddings,
            &bucket.key,
            params.disambiguation_gap,
        ) {
            tracing::debug!(
                cluster = %cluster_name,
                category = %choice.category,
                label = %choice.label,
                score = choice.score,
                size = cull.retained.len(),
                "cluster categorized"
            );
            for retained in &cull.retained {
                let photo = &photos[retained.photo];
                report.assignments.push(Assignment {
                    path: photo.path.clone(),
                    taken_at: photo.taken_at.clone(),
                    gps_latitude: photo.gps_latitude,
                    gps_longitude: photo.gps_longitude,
                    cluster: cluster_name.clone(),
                    category: choice.label.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::Category;
    use crate::embed::EmbedError;
    use image::{Rgb, RgbImage};
    use std::path::Path;
    use tempfile::tempdir;

    /// Embedder serving canned vectors keyed by file name.
    struct StubEmbedder {
        by_name: HashMap<String, Embedding>,
    }

    impl StubEmbedder {
        fn new(entries: &[(&str, Embedding)]) -> Self {
            Self {
                by_name: entries
                    .iter()
                    .map(|(name, e)| (name.to_string(), e.clone()))
                    .collect(),
            }
        }
    }

    impl ImageEmbedder for StubEmbedder {
        fn embed_images(&self, paths: &[PathBuf]) -> Result<Vec<Embedding>, EmbedError> {
            paths
                .iter()
                .map(|p| {
                    let name = p.file_name().unwrap().to_string_lossy().to_string();
                    self.by_name
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| EmbedError::ImageRead {
                            path: name,
                            message: "no stub vector".into(),
                        })
                })
                .collect()
        }
    }

    struct FailingEmbedder;

    impl ImageEmbedder for FailingEmbedder {
        fn embed_images(&self, _paths: &[PathBuf]) -> Result<Vec<Embedding>, EmbedError> {
            Err(EmbedError::Inference("offline".into()))
        }
    }

    fn write_textured_image(path: &Path, seed: u32) {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([
                ((x * 7 + seed * 31) % 256) as u8,
                ((y * 13 + seed * 17) % 256) as u8,
                ((x * y + seed) % 256) as u8,
            ])
        });
        img.save(path).unwrap();
    }

    fn photo(dir: &Path, name: &str, taken_at: Option<&str>, seed: u32) -> Photo {
        let path = dir.join(name);
        write_textured_image(&path, seed);
        Photo {
            path,
            taken_at: taken_at.map(str::to_string),
            gps_latitude: None,
            gps_longitude: None,
        }
    }

    fn beach_other_taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            Category {
                label: "Beach".to_string(),
                embedding: vec![1.0, 0.0],
            },
            Category {
                label: "Other".to_string(),
                embedding: vec![0.0, 1.0],
            },
        ])
        .unwrap()
    }

    fn test_params() -> PipelineParams {
        PipelineParams {
            cluster: ClusterParams {
                similarity_threshold: 0.85,
                window_size: 3,
            },
            dedup: DedupParams {
                // Tight threshold so distinct synthetic textures never
                // collide; blur filter open so every readable photo stays.
                phash_threshold: 1,
                blur_threshold: -1.0,
                resize_width: 64,
                resize_height: 64,
                hash_size: 8,
            },
            disambiguation_gap: 0.1,
        }
    }

    #[test]
    fn test_full_run_assigns_every_photo() {
        let dir = tempdir().unwrap();
        let photos = vec![
            photo(dir.path(), "a.png", Some("2024:03:15 09:00:00"), 1),
            photo(dir.path(), "b.png", Some("2024:03:15 09:01:00"), 2),
            photo(dir.path(), "c.png", Some("2024:03:16 10:00:00"), 3),
            photo(dir.path(), "d.png", Some("2024:03:16 10:05:00"), 4),
        ];

        let embedder = StubEmbedder::new(&[
            ("a.png", vec![1.0, 0.0]),
            ("b.png", vec![0.999, 0.0447]),
            // Mutually dissimilar: day two ends up in `others`.
            ("c.png", vec![0.0, 1.0]),
            ("d.png", vec![1.0, 0.0]),
        ]);

        let report = run(&photos, &embedder, &beach_other_taxonomy(), &test_params());

        assert_eq!(report.assignments.len(), 4);
        assert_eq!(report.stats.buckets, 2);
        assert_eq!(report.stats.buckets_skipped, 0);

        let by_name: HashMap<String, &Assignment> = report
            .assignments
            .iter()
            .map(|a| {
                (
                    a.path.file_name().unwrap().to_string_lossy().to_string(),
                    a,
                )
            })
            .collect();

        assert_eq!(by_name["a.png"].cluster, "cluster_0");
        assert_eq!(by_name["b.png"].cluster, "cluster_0");
        assert_eq!(by_name["a.png"].category, "2024_03_15_Beach");
        assert_eq!(by_name["c.png"].cluster, "others");
        assert_eq!(by_name["d.png"].cluster, "others");
    }

    #[test]
    fn test_failed_bucket_is_skipped_and_run_continues() {
        let dir = tempdir().unwrap();
        let photos = vec![
            photo(dir.path(), "a.png", Some("2024:03:15 09:00:00"), 1),
            photo(dir.path(), "b.png", Some("2024:03:15 09:01:00"), 2),
        ];

        let report = run(
            &photos,
            &FailingEmbedder,
            &beach_other_taxonomy(),
            &test_params(),
        );

        assert!(report.assignments.is_empty());
        assert_eq!(report.stats.buckets_skipped, 1);
        assert_eq!(report.stats.clusters, 0);
    }

    #[test]
    fn test_cluster_ids_monotonic_across_days() {
        let dir = tempdir().unwrap();
        let photos = vec![
            photo(dir.path(), "a.png", Some("2024:03:15 09:00:00"), 1),
            photo(dir.path(), "b.png", Some("2024:03:15 09:01:00"), 2),
            photo(dir.path(), "c.png", Some("2024:03:16 10:00:00"), 3),
            photo(dir.path(), "d.png", Some("2024:03:16 10:05:00"), 4),
        ];

        let embedder = StubEmbedder::new(&[
            ("a.png", vec![1.0, 0.0]),
            ("b.png", vec![0.999, 0.0447]),
            ("c.png", vec![0.0, 1.0]),
            ("d.png", vec![0.0447, 0.999]),
        ]);

        let report = run(&photos, &embedder, &beach_other_taxonomy(), &test_params());

        let clusters: Vec<String> = report.assignments.iter().map(|a| a.cluster.clone()).collect();
        assert!(clusters.contains(&"cluster_0".to_string()));
        assert!(clusters.contains(&"cluster_1".to_string()));
    }

    #[test]
    fn test_duplicates_are_removed_and_reported() {
        let dir = tempdir().unwrap();
        // Same pixels under two names: a perceptual duplicate pair.
        let first = photo(dir.path(), "a.png", Some("2024:03:15 09:00:00"), 1);
        let duplicate_path = dir.path().join("b.png");
        std::fs::copy(&first.path, &duplicate_path).unwrap();
        let photos = vec![
            first,
            Photo {
                path: duplicate_path,
                taken_at: Some("2024:03:15 09:01:00".to_string()),
                gps_latitude: None,
                gps_longitude: None,
            },
        ];

        let embedder = StubEmbedder::new(&[
            ("a.png", vec![1.0, 0.0]),
            ("b.png", vec![1.0, 0.0]),
        ]);

        let mut params = test_params();
        params.dedup.phash_threshold = 20;

        let report = run(&photos, &embedder, &beach_other_taxonomy(), &params);
        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].cluster, "cluster_0");

        // Quality-preference law: identical pixels tie, the incumbent stays.
        assert_eq!(
            report.assignments[0].path.file_name().unwrap(),
            "a.png"
        );
    }

    #[test]
    fn test_deterministic_output() {
        let dir = tempdir().unwrap();
        let photos = vec![
            photo(dir.path(), "a.png", Some("2024:03:15 09:00:00"), 1),
            photo(dir.path(), "b.png", Some("2024:03:15 09:01:00"), 2),
            photo(dir.path(), "c.png", None, 3),
        ];

        let embedder = StubEmbedder::new(&[
            ("a.png", vec![1.0, 0.0]),
            ("b.png", vec![0.999, 0.0447]),
            ("c.png", vec![0.0, 1.0]),
        ]);

        let first = run(&photos, &embedder, &beach_other_taxonomy(), &test_params());
        let second = run(&photos, &embedder, &beach_other_taxonomy(), &test_params());

        assert_eq!(first.assignments, second.assignments);
    }

    /// A singleton cluster (undated, one photo) labels under the fallback.
    #[test]
    fn test_undated_singleton_gets_fallback_label() {
        let dir = tempdir().unwrap();
        let photos = vec![photo(dir.path(), "solo.png", None, 5)];

        let embedder = StubEmbedder::new(&[("solo.png", vec![1.0, 0.0])]);

        let report = run(&photos, &embedder, &beach_other_taxonomy(), &test_params());

        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].cluster, "others");
        assert_eq!(report.assignments[0].category, "Other/Beach");
    }
}
