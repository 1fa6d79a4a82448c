use crate::{
    engine::{Candidate, Config, ShapeIndex},
    shared::Coordinate,
};

/// The resolved position of one stop along a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapAssignment {
    pub stop_idx: u32,
    pub point_idx: u32,
    pub arc_length: f64,
    pub snap_distance: f64,
}

/// Assigns every stop of a trip to a polyline point such that the chosen arc
/// lengths never decrease along the visit order.
///
/// Each stop draws its candidates from the index's k nearest points. If no
/// ordered choice exists at the current k, k doubles and the search retries,
/// up to `Config::max_neighbors` (clamped to the point count). Among ordered
/// choices the one with the smallest total snap distance wins; exact cost
/// ties resolve to the earliest polyline indices. Returns the final k on
/// failure.
pub fn match_stops(
    index: &ShapeIndex,
    stops: &[(u32, Coordinate)],
    config: &Config,
) -> Result<Vec<SnapAssignment>, usize> {
    let bound = config.max_neighbors.clamp(1, index.len());
    let mut k = config.initial_neighbors.clamp(1, bound);

    loop {
        let candidates: Vec<Vec<Candidate>> = stops
            .iter()
            .map(|(_, coordinate)| index.nearest(coordinate, k))
            .collect();

        if let Some(choice) = solve(&candidates) {
            let assignments = stops
                .iter()
                .zip(choice)
                .map(|((stop_idx, _), candidate)| SnapAssignment {
                    stop_idx: *stop_idx,
                    point_idx: candidate.point_idx,
                    arc_length: candidate.arc_length,
                    snap_distance: candidate.distance,
                })
                .collect();
            return Ok(assignments);
        }

        if k >= bound {
            return Err(k);
        }
        k = (k * 2).min(bound);
    }
}

// Cheapest ordered assignment as a forward dynamic program: for every stop
// and candidate, keep the cheapest total cost over non-decreasing arc
// lengths, then walk the parent chain back from the cheapest final state.
fn solve(candidates: &[Vec<Candidate>]) -> Option<Vec<Candidate>> {
    if candidates.iter().any(|row| row.is_empty()) {
        return None;
    }
    let first = candidates.first()?;

    let mut costs: Vec<Vec<f64>> = Vec::with_capacity(candidates.len());
    let mut parents: Vec<Vec<usize>> = Vec::with_capacity(candidates.len());
    costs.push(first.iter().map(|candidate| candidate.distance).collect());
    parents.push(vec![usize::MAX; first.len()]);

    for i in 1..candidates.len() {
        let mut row_costs = vec![f64::INFINITY; candidates[i].len()];
        let mut row_parents = vec![usize::MAX; candidates[i].len()];

        for (j, candidate) in candidates[i].iter().enumerate() {
            let mut best_parent_point = u32::MAX;
            for (p, previous) in candidates[i - 1].iter().enumerate() {
                if previous.arc_length > candidate.arc_length {
                    continue;
                }
                let through = costs[i - 1][p];
                if !through.is_finite() {
                    continue;
                }
                let total = through + candidate.distance;
                if total < row_costs[j]
                    || (total == row_costs[j] && previous.point_idx < best_parent_point)
                {
                    row_costs[j] = total;
                    row_parents[j] = p;
                    best_parent_point = previous.point_idx;
                }
            }
        }

        costs.push(row_costs);
        parents.push(row_parents);
    }

    let last_row = candidates.last()?;
    let mut best: Option<(f64, u32, usize)> = None;
    for (j, candidate) in last_row.iter().enumerate() {
        let cost = costs[candidates.len() - 1][j];
        if !cost.is_finite() {
            continue;
        }
        let replace = match best {
            None => true,
            Some((best_cost, best_point, _)) => {
                cost < best_cost || (cost == best_cost && candidate.point_idx < best_point)
            }
        };
        if replace {
            best = Some((cost, candidate.point_idx, j));
        }
    }

    let (_, _, mut j) = best?;
    let mut choice: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for i in (0..candidates.len()).rev() {
        choice.push(candidates[i][j]);
        j = parents[i][j];
    }
    choice.reverse();
    Some(choice)
}
