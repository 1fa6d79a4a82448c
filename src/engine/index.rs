use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::{
    engine::UpsampledShape,
    shared::{Coordinate, Projection},
};

/// One nearest-neighbor hit: a polyline point close to the queried stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub point_idx: u32,
    pub arc_length: f64,
    pub distance: f64,
}

struct IndexedPoint {
    position: [f64; 2],
    point_idx: u32,
    arc_length: f64,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Immutable nearest-neighbor index over an upsampled shape.
///
/// Points are keyed by their planar position in a projection anchored at the
/// shape's centroid, so query distances come back in meters. Shared
/// read-only by every trip matched against the shape.
pub struct ShapeIndex {
    tree: RTree<IndexedPoint>,
    projection: Projection,
    len: usize,
}

impl ShapeIndex {
    pub fn build(shape: &UpsampledShape) -> Option<Self> {
        if shape.is_empty() {
            return None;
        }
        let centroid: Coordinate = shape.points.iter().map(|point| point.coordinate).sum();
        let projection = Projection::centered_on(centroid);

        let nodes: Vec<IndexedPoint> = shape
            .points
            .iter()
            .enumerate()
            .map(|(i, point)| IndexedPoint {
                position: projection.project(&point.coordinate),
                point_idx: i as u32,
                arc_length: point.arc_length,
            })
            .collect();

        Some(Self {
            tree: RTree::bulk_load(nodes),
            projection,
            len: shape.len(),
        })
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `k` indexed points closest to `coordinate`, nearest first.
    pub fn nearest(&self, coordinate: &Coordinate, k: usize) -> Vec<Candidate> {
        let position = self.projection.project(coordinate);
        self.tree
            .nearest_neighbor_iter_with_distance_2(&position)
            .take(k)
            .map(|(node, distance_2)| Candidate {
                point_idx: node.point_idx,
                arc_length: node.arc_length,
                distance: distance_2.sqrt(),
            })
            .collect()
    }
}
