//! Day-scoped partitioning of the photo list.

use crate::scanner::Photo;

/// Key identifying one day bucket.
///
/// The dated form carries the raw EXIF date prefix, e.g. `"2024:03:15"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DayKey {
    Dated(String),
    Undated,
}

impl DayKey {
    /// Text used when composing category labels. EXIF `:` separators become
    /// `_` so the label is usable as a folder name.
    pub fn label_text(&self) -> String {
        match self {
            DayKey::Dated(day) => day.replace(':', "_"),
            DayKey::Undated => "undated".to_string(),
        }
    }
}

/// One day's worth of photos, as indices into the scanned photo list in
/// discovery order.
#[derive(Debug, Clone)]
pub struct DayBucket {
    pub key: DayKey,
    pub photos: Vec<usize>,
}

/// Group photos by the calendar-day prefix of their capture timestamp.
///
/// Input order is preserved within each bucket and no sorting by capture
/// time happens here: callers that want chronological adjacency must supply
/// already-ordered input. Buckets come out in first-seen order with the
/// undated bucket always last, so a fixed input yields a fixed bucket
/// sequence.
pub fn partition_by_day(photos: &[Photo]) -> Vec<DayBucket> {
    let mut buckets: Vec<DayBucket> = Vec::new();
    let mut undated: Vec<usize> = Vec::new();

    for (index, photo) in photos.iter().enumerate() {
        match day_of(photo) {
            Some(day) => {
                let existing = buckets
                    .iter_mut()
                    .find(|b| matches!(&b.key, DayKey::Dated(d) if *d == day));
                match existing {
                    Some(bucket) => bucket.photos.push(index),
                    None => buckets.push(DayBucket {
                        key: DayKey::Dated(day),
                        photos: vec![index],
                    }),
                }
            }
            None => undated.push(index),
        }
    }

    if !undated.is_empty() {
        tracing::debug!(count = undated.len(), "photos without a capture date");
        buckets.push(DayBucket {
            key: DayKey::Undated,
            photos: undated,
        });
    }

    buckets
}

/// The whitespace-delimited date portion of the capture timestamp, if any.
fn day_of(photo: &Photo) -> Option<String> {
    photo
        .taken_at
        .as_deref()
        .and_then(|ts| ts.split_whitespace().next())
        .map(str::to_string)
}
