use std::{fs::File, io, path::Path};

use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::{shared::Coordinate, stats::SegmentRecord};

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct GeometryRow<'a> {
    route_id: &'a str,
    segment_id: &'a str,
    stop_id1: &'a str,
    stop_id2: &'a str,
    distance: f64,
    traversals: u32,
    start_point: String,
    end_point: String,
    geometry: String,
}

#[derive(Serialize)]
struct FlatRow<'a> {
    route_id: &'a str,
    segment_id: &'a str,
    stop_id1: &'a str,
    stop_id2: &'a str,
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
    distance: f64,
    traversals: u32,
}

/// Writes the segment table as CSV, with the geometry as WKT columns or
/// reduced to endpoint coordinates.
pub fn write_csv<P: AsRef<Path>>(
    records: &[SegmentRecord],
    path: P,
    geometry: bool,
) -> Result<(), Error> {
    let mut writer = csv::Writer::from_path(&path)?;
    for record in records {
        let (Some(first), Some(last)) = (record.geometry.first(), record.geometry.last()) else {
            continue;
        };
        if geometry {
            writer.serialize(GeometryRow {
                route_id: &record.route_id,
                segment_id: &record.segment_id,
                stop_id1: &record.stop_id1,
                stop_id2: &record.stop_id2,
                distance: record.distance,
                traversals: record.traversals,
                start_point: wkt_point(first),
                end_point: wkt_point(last),
                geometry: wkt_linestring(&record.geometry),
            })?;
        } else {
            writer.serialize(FlatRow {
                route_id: &record.route_id,
                segment_id: &record.segment_id,
                stop_id1: &record.stop_id1,
                stop_id2: &record.stop_id2,
                start_lat: first.latitude,
                start_lon: first.longitude,
                end_lat: last.latitude,
                end_lon: last.longitude,
                distance: record.distance,
                traversals: record.traversals,
            })?;
        }
    }
    writer.flush()?;
    debug!("Wrote {} segment rows", records.len());
    Ok(())
}

/// Writes the segment table as a GeoJSON feature collection.
pub fn write_geojson<P: AsRef<Path>>(records: &[SegmentRecord], path: P) -> Result<(), Error> {
    let features: Vec<serde_json::Value> = records
        .iter()
        .map(|record| {
            let coordinates: Vec<[f64; 2]> = record
                .geometry
                .iter()
                .map(|coordinate| [coordinate.longitude, coordinate.latitude])
                .collect();
            json!({
                "type": "Feature",
                "properties": {
                    "route_id": record.route_id.as_ref(),
                    "segment_id": record.segment_id,
                    "stop_id1": record.stop_id1.as_ref(),
                    "stop_id2": record.stop_id2.as_ref(),
                    "direction_id": record.direction_id,
                    "distance": record.distance,
                    "traversals": record.traversals,
                },
                "geometry": {
                    "type": "LineString",
                    "coordinates": coordinates,
                },
            })
        })
        .collect();

    let collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    let file = File::create(path)?;
    serde_json::to_writer(file, &collection)?;
    debug!("Wrote {} segment features", records.len());
    Ok(())
}

fn wkt_point(coordinate: &Coordinate) -> String {
    format!("POINT ({} {})", coordinate.longitude, coordinate.latitude)
}

fn wkt_linestring(coordinates: &[Coordinate]) -> String {
    let points: Vec<String> = coordinates
        .iter()
        .map(|coordinate| format!("{} {}", coordinate.longitude, coordinate.latitude))
        .collect();
    format!("LINESTRING ({})", points.join(", "))
}
