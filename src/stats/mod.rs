use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{engine::Segment, shared::Coordinate};

/// One row of the consolidated segment table.
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    pub segment_id: String,
    pub route_id: Arc<str>,
    pub direction_id: Option<u8>,
    pub stop_id1: Arc<str>,
    pub stop_id2: Arc<str>,
    pub distance: f64,
    pub traversals: u32,
    pub geometry: Box<[Coordinate]>,
}

/// Collapses raw per-trip segments into unique table rows.
///
/// A segment is named `{stop_id1}-{stop_id2}-1`. When the same route and
/// name recur with materially different lengths (distinct rounded meters)
/// the later occurrences are renamed `-2`, `-3`, … so each row keeps one
/// geometry; occurrences with identical lengths merge, summing traversals.
pub fn consolidate(segments: &[Segment]) -> Vec<SegmentRecord> {
    let mut records: Vec<SegmentRecord> = segments
        .iter()
        .map(|segment| SegmentRecord {
            segment_id: format!("{}-{}-1", segment.start_stop_id, segment.end_stop_id),
            route_id: segment.route_id.clone(),
            direction_id: segment.direction_id,
            stop_id1: segment.start_stop_id.clone(),
            stop_id2: segment.end_stop_id.clone(),
            distance: segment.length.as_meters(),
            traversals: segment.traversals,
            geometry: segment.geometry.clone(),
        })
        .collect();

    let mut occurrences: HashMap<(Arc<str>, String), Vec<usize>> = HashMap::new();
    for (i, record) in records.iter().enumerate() {
        occurrences
            .entry((record.route_id.clone(), record.segment_id.clone()))
            .or_default()
            .push(i);
    }
    for indices in occurrences.values() {
        let distinct: HashSet<i64> = indices
            .iter()
            .map(|i| records[*i].distance.round() as i64)
            .collect();
        if distinct.len() < 2 {
            continue;
        }
        for (n, i) in indices.iter().enumerate().skip(1) {
            let record = &mut records[*i];
            record.segment_id = format!("{}-{}-{}", record.stop_id1, record.stop_id2, n + 1);
        }
    }

    let mut positions: HashMap<(Arc<str>, String), usize> = HashMap::new();
    let mut merged: Vec<SegmentRecord> = Vec::new();
    for record in records {
        let key = (record.route_id.clone(), record.segment_id.clone());
        match positions.get(&key) {
            Some(position) => merged[*position].traversals += record.traversals,
            None => {
                positions.insert(key, merged.len());
                merged.push(record);
            }
        }
    }
    merged
}

/// Distribution report over a consolidated segment table.
///
/// Spacings beyond `max_spacing` are excluded from the distribution and
/// reported as a share instead, matching how outliers (usually express or
/// deadhead-like legs) are treated when summarizing a network.
#[derive(Debug, Clone)]
pub struct SpacingSummary {
    pub segments: usize,
    pub routes: usize,
    pub traversals: u64,
    pub max_spacing: f64,
    pub percent_over_max_spacing: f64,
    pub segment_mean: f64,
    pub route_mean: f64,
    pub weighted_mean: f64,
    pub weighted_std: f64,
    pub weighted_quantile_25: f64,
    pub weighted_median: f64,
    pub weighted_quantile_75: f64,
}

pub const DEFAULT_MAX_SPACING: f64 = 3000.0;

impl SpacingSummary {
    pub fn from_records(records: &[SegmentRecord], max_spacing: f64) -> Self {
        let total_traversals: u64 = records.iter().map(|record| record.traversals as u64).sum();
        let over: u64 = records
            .iter()
            .filter(|record| record.distance > max_spacing)
            .map(|record| record.traversals as u64)
            .sum();
        let percent_over_max_spacing = if total_traversals == 0 {
            0.0
        } else {
            over as f64 / total_traversals as f64 * 100.0
        };

        let kept: Vec<&SegmentRecord> = records
            .iter()
            .filter(|record| record.distance <= max_spacing)
            .collect();

        let routes: HashSet<&str> = kept.iter().map(|record| record.route_id.as_ref()).collect();
        let traversals: u64 = kept.iter().map(|record| record.traversals as u64).sum();

        // Mean over unique segments, collapsing the same stop pair shared
        // by several routes.
        let unique_segments: HashSet<(&str, i64)> = kept
            .iter()
            .map(|record| (record.segment_id.as_str(), record.distance.round() as i64))
            .collect();
        let segment_mean = mean(unique_segments.iter().map(|(_, distance)| *distance as f64));
        let route_mean = mean(kept.iter().map(|record| record.distance));

        let mut weighted: Vec<(f64, u64)> = kept
            .iter()
            .map(|record| (record.distance, record.traversals as u64))
            .collect();
        weighted.sort_by(|(a, _), (b, _)| a.total_cmp(b));

        let weighted_mean = if traversals == 0 {
            0.0
        } else {
            weighted
                .iter()
                .map(|(distance, weight)| distance * *weight as f64)
                .sum::<f64>()
                / traversals as f64
        };
        let weighted_std = if traversals == 0 {
            0.0
        } else {
            let variance = weighted
                .iter()
                .map(|(distance, weight)| (distance - weighted_mean).powi(2) * *weight as f64)
                .sum::<f64>()
                / traversals as f64;
            variance.sqrt()
        };

        Self {
            segments: kept.len(),
            routes: routes.len(),
            traversals,
            max_spacing,
            percent_over_max_spacing,
            segment_mean,
            route_mean,
            weighted_mean,
            weighted_std,
            weighted_quantile_25: weighted_quantile(&weighted, traversals, 0.25),
            weighted_median: weighted_quantile(&weighted, traversals, 0.50),
            weighted_quantile_75: weighted_quantile(&weighted, traversals, 0.75),
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let mut count = 0usize;
    let mut sum = 0.0;
    for value in values {
        count += 1;
        sum += value;
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

// Quantile over the traversal-expanded distribution with linear
// interpolation between adjacent expanded values.
fn weighted_quantile(sorted: &[(f64, u64)], total: u64, q: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let position = (total as f64 - 1.0) * q;
    let low = value_at(sorted, position.floor() as u64);
    let high = value_at(sorted, position.ceil() as u64);
    low + (high - low) * (position - position.floor())
}

fn value_at(sorted: &[(f64, u64)], index: u64) -> f64 {
    let mut cumulative = 0u64;
    for (distance, weight) in sorted {
        cumulative += weight;
        if cumulative > index {
            return *distance;
        }
    }
    sorted.last().map(|(distance, _)| *distance).unwrap_or(0.0)
}
