use crate::{
    engine::{SnapAssignment, UpsampledShape},
    shared::{Coordinate, Distance},
};

impl UpsampledShape {
    /// The sub-path between two resolved stop positions.
    ///
    /// Includes both matched points and everything between them; the length
    /// is the sum of the pairwise distances along the sub-path. A pair
    /// resolved to the same point yields that point twice and length zero.
    pub fn slice_between(
        &self,
        start: &SnapAssignment,
        end: &SnapAssignment,
    ) -> (Box<[Coordinate]>, Distance) {
        let start_idx = start.point_idx as usize;
        let end_idx = end.point_idx as usize;

        if start_idx == end_idx {
            let point = self.points[start_idx].coordinate;
            return (Box::new([point, point]), Distance::from_meters(0.0));
        }

        let geometry: Box<[Coordinate]> = self.points[start_idx..=end_idx]
            .iter()
            .map(|point| point.coordinate)
            .collect();
        let length: Distance = geometry
            .windows(2)
            .map(|pair| pair[0].haversine_distance(&pair[1]))
            .sum();
        (geometry, length)
    }
}
