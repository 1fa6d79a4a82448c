use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::NaiveDate;

mod models;
mod source;
pub use models::*;

use crate::shared::Coordinate;

/// Normalized, read-only view of a GTFS feed.
///
/// All tables live in flat arrays addressed by index; id based access goes
/// through the lookup maps. Built once with [`Repository::load_gtfs`] and
/// shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Repository {
    pub stops: Box<[Stop]>,
    pub routes: Box<[Route]>,
    pub trips: Box<[Trip]>,
    pub stop_times: Box<[StopTime]>,
    pub shape_points: Box<[Coordinate]>,
    pub services: Box<[Service]>,

    pub(crate) stop_lookup: HashMap<Arc<str>, u32>,
    pub(crate) route_lookup: HashMap<Arc<str>, u32>,
    pub(crate) trip_lookup: HashMap<Arc<str>, u32>,
    pub(crate) shape_lookup: HashMap<Arc<str>, Slice>,
    pub(crate) trip_to_stop_times_slice: Box<[Slice]>,
}

impl Repository {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get_stop(&self, id: &str) -> Option<&Stop> {
        let index = self.stop_lookup.get(id)?;
        Some(&self.stops[*index as usize])
    }

    pub fn get_route(&self, id: &str) -> Option<&Route> {
        let index = self.route_lookup.get(id)?;
        Some(&self.routes[*index as usize])
    }

    pub fn get_trip(&self, id: &str) -> Option<&Trip> {
        let index = self.trip_lookup.get(id)?;
        Some(&self.trips[*index as usize])
    }

    /// The ordered vertices of a shape, if the feed carries it.
    pub fn polyline(&self, shape_id: &str) -> Option<&[Coordinate]> {
        let slice = self.shape_lookup.get(shape_id)?;
        Some(&self.shape_points[slice.range()])
    }

    /// Stop times of one trip, ordered by stop sequence.
    pub fn stop_times_for_trip(&self, trip_idx: u32) -> &[StopTime] {
        let slice = self.trip_to_stop_times_slice[trip_idx as usize];
        &self.stop_times[slice.range()]
    }

    /// The stop indices a trip actually serves, in visit order.
    ///
    /// Deadhead ends are trimmed: a leading stop without pickup and a
    /// trailing stop without drop off are not part of the revenue path.
    /// Consecutive repeats of the same stop collapse into one visit.
    pub fn stop_sequence(&self, trip_idx: u32) -> Vec<u32> {
        let mut stop_times = self.stop_times_for_trip(trip_idx);
        if let Some(first) = stop_times.first()
            && first.pickup_type == StopAccessType::NoneAvailable
        {
            stop_times = &stop_times[1..];
        }
        if let Some(last) = stop_times.last()
            && last.drop_off_type == StopAccessType::NoneAvailable
        {
            stop_times = &stop_times[..stop_times.len() - 1];
        }

        let mut sequence: Vec<u32> = Vec::with_capacity(stop_times.len());
        for stop_time in stop_times {
            if sequence.last() != Some(&stop_time.stop_idx) {
                sequence.push(stop_time.stop_idx);
            }
        }
        sequence
    }

    /// The date with the most scheduled trips, together with the service ids
    /// active on it. Ties resolve to the earliest date.
    pub fn busiest_date(&self) -> Option<(NaiveDate, Vec<Arc<str>>)> {
        let mut trips_per_service: HashMap<&str, u32> = HashMap::new();
        for trip in &self.trips {
            *trips_per_service.entry(&trip.service_id).or_default() += 1;
        }

        let mut per_date: HashMap<NaiveDate, (u32, Vec<Arc<str>>)> = HashMap::new();
        for service in &self.services {
            let trips = trips_per_service.get(service.id.as_ref()).copied();
            let Some(trips) = trips else {
                continue;
            };
            for date in service.active_dates() {
                let entry = per_date.entry(date).or_default();
                entry.0 += trips;
                entry.1.push(service.id.clone());
            }
        }

        let (date, (_, mut service_ids)) = per_date
            .into_iter()
            .max_by_key(|(date, (trips, _))| (*trips, std::cmp::Reverse(*date)))?;
        service_ids.sort();
        Some((date, service_ids))
    }

    /// Groups bus trips running on the given services by route, direction
    /// and shape, and picks the first trip of each group to stand in for the
    /// rest. The group's size is kept as its traversal count.
    pub fn representative_trips(&self, service_ids: &[Arc<str>]) -> Vec<TripGroup> {
        let services: HashSet<&str> = service_ids.iter().map(|id| id.as_ref()).collect();
        let mut positions: HashMap<(u32, Option<u8>, Arc<str>), usize> = HashMap::new();
        let mut groups: Vec<TripGroup> = Vec::new();

        for trip in &self.trips {
            if !services.contains(trip.service_id.as_ref()) {
                continue;
            }
            let route = &self.routes[trip.route_idx as usize];
            if !route.is_bus() {
                continue;
            }
            let Some(shape_id) = &trip.shape_id else {
                continue;
            };

            let key = (trip.route_idx, trip.direction_id, shape_id.clone());
            match positions.get(&key) {
                Some(position) => groups[*position].traversals += 1,
                None => {
                    positions.insert(key, groups.len());
                    groups.push(TripGroup {
                        trip_idx: trip.index,
                        trip_id: trip.id.clone(),
                        route_id: route.id.clone(),
                        direction_id: trip.direction_id,
                        shape_id: shape_id.clone(),
                        traversals: 1,
                    });
                }
            }
        }
        groups
    }
}
