use lineforge_types::Cpm;
use serde::Deserialize;
use std::collections::BTreeSet;

/// One contiguous CPM range, stepped inclusively from `min` to `max`.
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub min: Cpm,
    pub max: Cpm,
    pub interval: Cpm,
}

/// The price granularity: a list of buckets expanded into discrete points.
///
/// Buckets may overlap; expansion dedupes and orders ascending so every
/// price point appears exactly once across the whole run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GranularityConfig {
    pub buckets: Vec<Bucket>,
}

impl GranularityConfig {
    /// All distinct CPM points, ascending.
    pub fn points(&self) -> Vec<Cpm> {
        let mut points = BTreeSet::new();
        for bucket in &self.buckets {
            let mut p = bucket.min;
            while p <= bucket.max {
                points.insert(p);
                p = p + bucket.interval;
            }
        }
        points.into_iter().collect()
    }
}

/// Partition points into fixed-size batches, preserving order.
///
/// The partition is the unit of line-item generation: one Order per batch,
/// one LineItem per point. Builders never re-partition.
pub fn batch_points(points: &[Cpm], batch_size: usize) -> Vec<Vec<Cpm>> {
    points
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
