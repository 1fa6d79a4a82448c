use std::{collections::HashMap, fmt::Display, sync::Arc, time::Instant};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace, warn};

mod index;
mod matcher;
mod slicer;
mod upsample;

pub use index::*;
pub use matcher::*;
pub use upsample::*;

use crate::{
    repository::{Repository, TripGroup},
    shared::{Coordinate, Distance},
};

// Above this share of failed trips the input itself is suspect.
const ELEVATED_FAILURE_RATE: f64 = 0.01;

#[derive(Error, Debug)]
pub enum Error {
    #[error("feed carries no shape geometry")]
    MissingGeometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The trip's shape id is not in the feed.
    ShapeMissing,
    /// The shape has fewer than two distinct vertices.
    MalformedShape,
    /// No points were left to index after upsampling.
    IndexEmpty,
    /// Fewer than two stops remained after trimming.
    TooFewStops,
    /// No ordered assignment was found; carries the last neighbor count tried.
    Unordered { last_neighbors: usize },
}

impl Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ShapeMissing => write!(f, "shape not found in feed"),
            Self::MalformedShape => write!(f, "shape has fewer than two distinct vertices"),
            Self::IndexEmpty => write!(f, "no indexable shape points"),
            Self::TooFewStops => write!(f, "fewer than two stops after trimming"),
            Self::Unordered { last_neighbors } => {
                write!(f, "no ordered assignment within {last_neighbors} neighbors")
            }
        }
    }
}

/// A trip that produced no segments, and why.
#[derive(Debug, Clone)]
pub struct TripFailure {
    pub trip_id: Arc<str>,
    pub shape_id: Arc<str>,
    pub reason: FailureReason,
}

/// The path between two consecutive stops of one representative trip.
#[derive(Debug, Clone)]
pub struct Segment {
    pub route_id: Arc<str>,
    pub direction_id: Option<u8>,
    pub trip_id: Arc<str>,
    pub shape_id: Arc<str>,
    pub start_stop_id: Arc<str>,
    pub end_stop_id: Arc<str>,
    pub geometry: Box<[Coordinate]>,
    pub length: Distance,
    pub traversals: u32,
}

/// Everything one run produced: segments for resolved trips, failure records
/// for the rest.
#[derive(Debug, Default)]
pub struct Batch {
    pub segments: Vec<Segment>,
    pub failures: Vec<TripFailure>,
    pub trips_processed: usize,
}

impl Batch {
    pub fn failure_rate(&self) -> f64 {
        if self.trips_processed == 0 {
            return 0.0;
        }
        self.failures.len() as f64 / self.trips_processed as f64
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Target distance between consecutive points after upsampling.
    pub spacing: Distance,
    /// Neighbor count the matcher starts at.
    pub initial_neighbors: usize,
    /// Neighbor count the matcher gives up at, clamped to the point count.
    pub max_neighbors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spacing: Distance::from_meters(5.0),
            initial_neighbors: 3,
            max_neighbors: 512,
        }
    }
}

/// Turns representative trips into stop-to-stop segments.
///
/// Work fans out across shapes; each shape is upsampled and indexed once and
/// the index is shared by every trip group on it. One trip failing to
/// resolve never affects its siblings.
pub struct Engine<'a> {
    repository: &'a Repository,
    config: Config,
}

impl<'a> Engine<'a> {
    pub fn new(repository: &'a Repository) -> Self {
        Self {
            repository,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn run(&self, groups: &[TripGroup]) -> Result<Batch, Error> {
        if self.repository.shape_points.is_empty() {
            return Err(Error::MissingGeometry);
        }

        // Bucket the groups per shape in first-seen order so results come
        // back in a stable order regardless of thread scheduling.
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut buckets: Vec<(&Arc<str>, Vec<&TripGroup>)> = Vec::new();
        for group in groups {
            match positions.get(group.shape_id.as_ref()) {
                Some(position) => buckets[*position].1.push(group),
                None => {
                    positions.insert(group.shape_id.as_ref(), buckets.len());
                    buckets.push((&group.shape_id, vec![group]));
                }
            }
        }

        let results: Vec<(Vec<Segment>, Vec<TripFailure>)> = buckets
            .par_iter()
            .map(|(shape_id, members)| self.process_shape(shape_id, members))
            .collect();

        let mut batch = Batch {
            segments: Vec::new(),
            failures: Vec::new(),
            trips_processed: groups.len(),
        };
        for (mut segments, mut failures) in results {
            batch.segments.append(&mut segments);
            batch.failures.append(&mut failures);
        }

        if batch.failure_rate() > ELEVATED_FAILURE_RATE {
            warn!(
                "{} of {} trips failed to resolve, input shapes may be malformed",
                batch.failures.len(),
                batch.trips_processed
            );
        }
        Ok(batch)
    }

    fn process_shape(
        &self,
        shape_id: &Arc<str>,
        groups: &[&TripGroup],
    ) -> (Vec<Segment>, Vec<TripFailure>) {
        let fail_all = |reason: FailureReason| {
            let failures = groups
                .iter()
                .map(|group| TripFailure {
                    trip_id: group.trip_id.clone(),
                    shape_id: shape_id.clone(),
                    reason,
                })
                .collect();
            (Vec::new(), failures)
        };

        let Some(polyline) = self.repository.polyline(shape_id) else {
            return fail_all(FailureReason::ShapeMissing);
        };
        if polyline.len() < 2 {
            return fail_all(FailureReason::MalformedShape);
        }
        let now = Instant::now();
        let shape = upsample(polyline, self.config.spacing);
        let Some(index) = ShapeIndex::build(&shape) else {
            return fail_all(FailureReason::IndexEmpty);
        };
        debug!(
            "Indexed shape {shape_id} ({} points) in {:?}",
            shape.len(),
            now.elapsed()
        );

        let mut segments: Vec<Segment> = Vec::new();
        let mut failures: Vec<TripFailure> = Vec::new();
        for group in groups {
            let sequence = self.repository.stop_sequence(group.trip_idx);
            if sequence.len() < 2 {
                failures.push(TripFailure {
                    trip_id: group.trip_id.clone(),
                    shape_id: shape_id.clone(),
                    reason: FailureReason::TooFewStops,
                });
                continue;
            }

            let stops: Vec<(u32, Coordinate)> = sequence
                .iter()
                .map(|stop_idx| {
                    (
                        *stop_idx,
                        self.repository.stops[*stop_idx as usize].coordinate,
                    )
                })
                .collect();

            match match_stops(&index, &stops, &self.config) {
                Ok(assignments) => {
                    trace!(
                        "Matched trip {} across {} stops",
                        group.trip_id,
                        assignments.len()
                    );
                    for pair in assignments.windows(2) {
                        let (geometry, length) = shape.slice_between(&pair[0], &pair[1]);
                        segments.push(Segment {
                            route_id: group.route_id.clone(),
                            direction_id: group.direction_id,
                            trip_id: group.trip_id.clone(),
                            shape_id: shape_id.clone(),
                            start_stop_id: self.repository.stops[pair[0].stop_idx as usize]
                                .id
                                .clone(),
                            end_stop_id: self.repository.stops[pair[1].stop_idx as usize]
                                .id
                                .clone(),
                            geometry,
                            length,
                            traversals: group.traversals,
                        });
                    }
                }
                Err(last_neighbors) => failures.push(TripFailure {
                    trip_id: group.trip_id.clone(),
                    shape_id: shape_id.clone(),
                    reason: FailureReason::Unordered { last_neighbors },
                }),
            }
        }
        (segments, failures)
    }
}
