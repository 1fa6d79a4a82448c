use crate::{
    gtfs::{self, GtfsReader},
    repository::{Repository, Route, Service, Slice, Stop, StopTime, Trip},
    shared::Coordinate,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{debug, warn};

impl Repository {
    /// Streams a GTFS archive into normalized tables.
    ///
    /// Depending on the size of the feed this can be a long blocking call.
    /// A feed without `shapes.txt` still loads; downstream segment building
    /// will reject it.
    pub fn load_gtfs(mut self, gtfs: GtfsReader) -> Result<Self, gtfs::Error> {
        self.load_stops(&gtfs)?;
        self.load_routes(&gtfs)?;
        self.load_shapes(&gtfs)?;
        self.load_trips(&gtfs)?;
        self.load_stop_times(&gtfs)?;
        self.load_services(&gtfs)?;
        Ok(self)
    }

    fn load_stops(&mut self, gtfs: &GtfsReader) -> Result<(), gtfs::Error> {
        debug!("Loading stops...");
        let now = Instant::now();
        let mut stop_lookup: HashMap<Arc<str>, u32> = HashMap::new();
        let mut stops: Vec<Stop> = Vec::new();
        gtfs.stream_stops(|(i, stop)| {
            let mut value: Stop = stop.into();
            value.index = i as u32;
            stop_lookup.insert(value.id.clone(), i as u32);
            stops.push(value);
        })?;
        self.stops = stops.into();
        self.stop_lookup = stop_lookup;
        debug!("Loading stops took {:?}", now.elapsed());
        Ok(())
    }

    fn load_routes(&mut self, gtfs: &GtfsReader) -> Result<(), gtfs::Error> {
        debug!("Loading routes...");
        let now = Instant::now();
        let mut route_lookup: HashMap<Arc<str>, u32> = HashMap::new();
        let mut routes: Vec<Route> = Vec::new();
        gtfs.stream_routes(|(i, route)| {
            let mut value: Route = route.into();
            value.index = i as u32;
            route_lookup.insert(value.id.clone(), i as u32);
            routes.push(value);
        })?;
        self.routes = routes.into();
        self.route_lookup = route_lookup;
        debug!("Loading routes took {:?}", now.elapsed());
        Ok(())
    }

    fn load_shapes(&mut self, gtfs: &GtfsReader) -> Result<(), gtfs::Error> {
        debug!("Loading shapes...");
        let now = Instant::now();
        let mut grouped: HashMap<Arc<str>, Vec<(u32, Coordinate)>> = HashMap::new();
        let mut order: Vec<Arc<str>> = Vec::new();
        let result = gtfs.stream_shapes(|(_, shape)| {
            let coordinate = Coordinate::new(shape.shape_pt_lat, shape.shape_pt_lon);
            let id: Arc<str> = shape.shape_id.into();
            match grouped.get_mut(&id) {
                Some(points) => points.push((shape.shape_pt_sequence, coordinate)),
                None => {
                    order.push(id.clone());
                    grouped.insert(id, vec![(shape.shape_pt_sequence, coordinate)]);
                }
            }
        });
        match result {
            Err(gtfs::Error::FileNotFound(name)) => {
                warn!("Feed has no {name}, shapes table left empty");
                return Ok(());
            }
            other => other?,
        }

        let mut shape_lookup: HashMap<Arc<str>, Slice> = HashMap::new();
        let mut shape_points: Vec<Coordinate> = Vec::new();
        let mut duplicates = 0usize;
        for id in order {
            let mut points = grouped.remove(&id).unwrap_or_default();
            points.par_sort_by_key(|(sequence, _)| *sequence);

            let start_idx = shape_points.len() as u32;
            let mut last: Option<Coordinate> = None;
            for (_, coordinate) in points {
                if last == Some(coordinate) {
                    duplicates += 1;
                    continue;
                }
                shape_points.push(coordinate);
                last = Some(coordinate);
            }
            let slice = Slice {
                start_idx,
                count: shape_points.len() as u32 - start_idx,
            };
            shape_lookup.insert(id, slice);
        }
        if duplicates > 0 {
            debug!("Dropped {duplicates} consecutive duplicate shape points");
        }

        self.shape_points = shape_points.into();
        self.shape_lookup = shape_lookup;
        debug!("Loading shapes took {:?}", now.elapsed());
        Ok(())
    }

    fn load_trips(&mut self, gtfs: &GtfsReader) -> Result<(), gtfs::Error> {
        debug!("Loading trips...");
        let now = Instant::now();
        let mut trip_lookup: HashMap<Arc<str>, u32> = HashMap::new();
        let mut trips: Vec<Trip> = Vec::new();
        let mut orphans = 0usize;
        gtfs.stream_trips(|(_, trip)| {
            let Some(route_idx) = self.route_lookup.get(trip.route_id.as_str()) else {
                orphans += 1;
                return;
            };
            let mut value: Trip = trip.into();
            value.index = trips.len() as u32;
            value.route_idx = *route_idx;
            trip_lookup.insert(value.id.clone(), value.index);
            trips.push(value);
        })?;
        if orphans > 0 {
            debug!("Skipped {orphans} trips referencing unknown routes");
        }
        self.trips = trips.into();
        self.trip_lookup = trip_lookup;
        debug!("Loading trips took {:?}", now.elapsed());
        Ok(())
    }

    fn load_stop_times(&mut self, gtfs: &GtfsReader) -> Result<(), gtfs::Error> {
        debug!("Loading stop times...");
        let now = Instant::now();
        let mut stop_times: Vec<StopTime> = Vec::new();
        let mut orphans = 0usize;
        gtfs.stream_stop_times(|(_, stop_time)| {
            let trip_idx = self.trip_lookup.get(stop_time.trip_id.as_str());
            let stop_idx = self.stop_lookup.get(stop_time.stop_id.as_str());
            let (Some(trip_idx), Some(stop_idx)) = (trip_idx, stop_idx) else {
                orphans += 1;
                return;
            };
            stop_times.push(StopTime {
                trip_idx: *trip_idx,
                stop_idx: *stop_idx,
                sequence: stop_time.stop_sequence,
                pickup_type: stop_time.pickup_type.into(),
                drop_off_type: stop_time.drop_off_type.into(),
            });
        })?;
        if orphans > 0 {
            debug!("Skipped {orphans} stop times referencing unknown trips or stops");
        }

        stop_times.par_sort_by_key(|stop_time| (stop_time.trip_idx, stop_time.sequence));

        let mut trip_to_stop_times_slice: Vec<Slice> = vec![Default::default(); self.trips.len()];
        let mut cursor = 0usize;
        while cursor < stop_times.len() {
            let trip_idx = stop_times[cursor].trip_idx;
            let start = cursor;
            while cursor < stop_times.len() && stop_times[cursor].trip_idx == trip_idx {
                cursor += 1;
            }
            trip_to_stop_times_slice[trip_idx as usize] = Slice {
                start_idx: start as u32,
                count: (cursor - start) as u32,
            };
        }

        self.stop_times = stop_times.into();
        self.trip_to_stop_times_slice = trip_to_stop_times_slice.into();
        debug!("Loading stop times took {:?}", now.elapsed());
        Ok(())
    }

    fn load_services(&mut self, gtfs: &GtfsReader) -> Result<(), gtfs::Error> {
        debug!("Loading services...");
        let now = Instant::now();
        let mut service_lookup: HashMap<Arc<str>, usize> = HashMap::new();
        let mut services: Vec<Service> = Vec::new();

        let result = gtfs.stream_calendars(|(_, calendar)| {
            let id: Arc<str> = calendar.service_id.clone().into();
            let position = *service_lookup.entry(id.clone()).or_insert_with(|| {
                services.push(Service::new(id));
                services.len() - 1
            });
            let service = &mut services[position];
            service.weekdays = [
                calendar.monday != 0,
                calendar.tuesday != 0,
                calendar.wednesday != 0,
                calendar.thursday != 0,
                calendar.friday != 0,
                calendar.saturday != 0,
                calendar.sunday != 0,
            ];
            service.start_date = parse_date(&calendar.start_date);
            service.end_date = parse_date(&calendar.end_date);
        });
        if let Err(error) = result {
            match error {
                gtfs::Error::FileNotFound(_) => (),
                other => return Err(other),
            }
        }

        let result = gtfs.stream_calendar_dates(|(_, exception)| {
            let Some(date) = parse_date(&exception.date) else {
                return;
            };
            let id: Arc<str> = exception.service_id.clone().into();
            let position = *service_lookup.entry(id.clone()).or_insert_with(|| {
                services.push(Service::new(id));
                services.len() - 1
            });
            let service = &mut services[position];
            match exception.exception_type {
                1 => service.added.push(date),
                2 => service.removed.push(date),
                _ => (),
            }
        });
        if let Err(error) = result {
            match error {
                gtfs::Error::FileNotFound(_) => (),
                other => return Err(other),
            }
        }

        self.services = services.into();
        debug!("Loading services took {:?}", now.elapsed());
        Ok(())
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}
