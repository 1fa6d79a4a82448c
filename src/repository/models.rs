use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::{
    gtfs::models::{GtfsRoute, GtfsStop, GtfsTrip},
    shared::Coordinate,
};

/// Window into one of the repository's flat arrays.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start_idx: u32,
    pub count: u32,
}

impl Slice {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_idx as usize..(self.start_idx + self.count) as usize
    }
}

#[derive(Debug, Default, Clone)]
pub struct Stop {
    pub index: u32,
    pub id: Arc<str>,
    pub name: Option<Arc<str>>,
    pub coordinate: Coordinate,
}

impl From<GtfsStop> for Stop {
    fn from(value: GtfsStop) -> Self {
        Self {
            index: u32::MAX,
            id: value.stop_id.into(),
            name: value.stop_name.map(|val| val.into()),
            coordinate: Coordinate::new(value.stop_lat, value.stop_lon),
        }
    }
}

// Conventional and extended route type codes that identify bus service.
const BUS_ROUTE_TYPES: [i32; 6] = [3, 700, 702, 703, 704, 705];

#[derive(Debug, Default, Clone)]
pub struct Route {
    pub index: u32,
    pub id: Arc<str>,
    pub short_name: Option<Arc<str>>,
    pub long_name: Option<Arc<str>>,
    pub route_type: i32,
}

impl Route {
    pub fn is_bus(&self) -> bool {
        BUS_ROUTE_TYPES.contains(&self.route_type)
    }
}

impl From<GtfsRoute> for Route {
    fn from(value: GtfsRoute) -> Self {
        Self {
            index: u32::MAX,
            id: value.route_id.into(),
            short_name: value.route_short_name.map(|val| val.into()),
            long_name: value.route_long_name.map(|val| val.into()),
            route_type: value.route_type,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Trip {
    pub index: u32,
    pub id: Arc<str>,
    pub route_idx: u32,
    pub service_id: Arc<str>,
    pub shape_id: Option<Arc<str>>,
    pub direction_id: Option<u8>,
    pub head_sign: Option<Arc<str>>,
}

impl From<GtfsTrip> for Trip {
    fn from(value: GtfsTrip) -> Self {
        Self {
            index: u32::MAX,
            id: value.trip_id.into(),
            route_idx: u32::MAX,
            service_id: value.service_id.into(),
            shape_id: value.shape_id.map(|val| val.into()),
            direction_id: value.direction_id,
            head_sign: value.trip_headsign.map(|val| val.into()),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StopAccessType {
    #[default]
    Regularly,
    NoneAvailable,
    AgencyArrange,
    DriverArrange,
}

impl From<Option<u8>> for StopAccessType {
    fn from(value: Option<u8>) -> Self {
        match value {
            Some(1) => Self::NoneAvailable,
            Some(2) => Self::AgencyArrange,
            Some(3) => Self::DriverArrange,
            _ => Self::Regularly,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct StopTime {
    pub trip_idx: u32,
    pub stop_idx: u32,
    pub sequence: u32,
    pub pickup_type: StopAccessType,
    pub drop_off_type: StopAccessType,
}

/// One service calendar entry, merged from `calendar.txt` and its
/// `calendar_dates.txt` exceptions.
#[derive(Debug, Clone)]
pub struct Service {
    pub id: Arc<str>,
    pub weekdays: [bool; 7],
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub added: Vec<NaiveDate>,
    pub removed: Vec<NaiveDate>,
}

impl Service {
    pub fn new(id: Arc<str>) -> Self {
        Self {
            id,
            weekdays: [false; 7],
            start_date: None,
            end_date: None,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Every date this service runs on.
    pub fn active_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = Vec::new();
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            dates.extend(
                start
                    .iter_days()
                    .take_while(|date| *date <= end)
                    .filter(|date| self.weekdays[date.weekday().num_days_from_monday() as usize])
                    .filter(|date| !self.removed.contains(date)),
            );
        }
        for date in &self.added {
            if !dates.contains(date) {
                dates.push(*date);
            }
        }
        dates.sort();
        dates
    }
}

/// One unit of matching work: a representative trip standing in for every
/// trip that shares its route, direction and shape.
#[derive(Debug, Clone)]
pub struct TripGroup {
    pub trip_idx: u32,
    pub trip_id: Arc<str>,
    pub route_id: Arc<str>,
    pub direction_id: Option<u8>,
    pub shape_id: Arc<str>,
    pub traversals: u32,
}
