use tracing::warn;

use crate::shared::{Coordinate, Distance};

// Below this total length a polyline is not worth densifying.
const MIN_SHAPE_LENGTH: Distance = Distance::from_meters(1e-3);

/// A shape vertex tagged with its distance from the start of the polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapePoint {
    pub coordinate: Coordinate,
    pub arc_length: f64,
}

/// A shape densified to a target point spacing.
///
/// Carries every original vertex in order, plus interpolated points wherever
/// two consecutive vertices sit further apart than the target spacing. Arc
/// lengths accumulate haversine distances over the final point sequence, so
/// slicing between two points and summing pairwise distances reproduces the
/// difference of their arc lengths exactly.
#[derive(Debug, Clone, Default)]
pub struct UpsampledShape {
    pub points: Box<[ShapePoint]>,
}

impl UpsampledShape {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Arc length between two point indices.
    pub fn span(&self, start: usize, end: usize) -> f64 {
        self.points[end].arc_length - self.points[start].arc_length
    }
}

/// Inserts interpolated points between vertices further apart than `spacing`.
pub fn upsample(polyline: &[Coordinate], spacing: Distance) -> UpsampledShape {
    let total: Distance = polyline
        .windows(2)
        .map(|pair| pair[0].haversine_distance(&pair[1]))
        .sum();
    if total < MIN_SHAPE_LENGTH {
        warn!(
            "Shape with {} vertices has near-zero length, skipping upsampling",
            polyline.len()
        );
        return tag_arc_lengths(polyline.iter().copied());
    }

    let spacing = spacing.as_meters();
    let mut coordinates: Vec<Coordinate> = Vec::with_capacity(polyline.len());
    for pair in polyline.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        coordinates.push(a);

        let gap = a.haversine_distance(&b).as_meters();
        if gap <= spacing {
            continue;
        }
        let splits = (gap / spacing).ceil() as usize;
        for j in 1..splits {
            let t = j as f64 / splits as f64;
            coordinates.push(Coordinate::new(
                a.latitude + (b.latitude - a.latitude) * t,
                a.longitude + (b.longitude - a.longitude) * t,
            ));
        }
    }
    if let Some(last) = polyline.last() {
        coordinates.push(*last);
    }

    tag_arc_lengths(coordinates.into_iter())
}

fn tag_arc_lengths(coordinates: impl Iterator<Item = Coordinate>) -> UpsampledShape {
    let mut points: Vec<ShapePoint> = Vec::new();
    let mut arc_length = 0.0;
    for coordinate in coordinates {
        if let Some(previous) = points.last() {
            arc_length += previous
                .coordinate
                .haversine_distance(&coordinate)
                .as_meters();
        }
        points.push(ShapePoint {
            coordinate,
            arc_length,
        });
    }
    UpsampledShape {
        points: points.into(),
    }
}
