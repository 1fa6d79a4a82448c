use milepost::engine::Segment;
use milepost::export::{write_csv, write_geojson};
use milepost::shared::{Coordinate, Distance};
use milepost::stats::consolidate;

fn records() -> Vec<milepost::stats::SegmentRecord> {
    let segments = vec![
        Segment {
            route_id: "r1".into(),
            direction_id: Some(0),
            trip_id: "t1".into(),
            shape_id: "sh1".into(),
            start_stop_id: "a".into(),
            end_stop_id: "b".into(),
            geometry: Box::new([
                Coordinate::new(59.33, 18.06),
                Coordinate::new(59.331, 18.061),
                Coordinate::new(59.332, 18.062),
            ]),
            length: Distance::from_meters(250.0),
            traversals: 3,
        },
        Segment {
            route_id: "r1".into(),
            direction_id: Some(0),
            trip_id: "t1".into(),
            shape_id: "sh1".into(),
            start_stop_id: "b".into(),
            end_stop_id: "c".into(),
            geometry: Box::new([
                Coordinate::new(59.332, 18.062),
                Coordinate::new(59.333, 18.063),
            ]),
            length: Distance::from_meters(130.0),
            traversals: 3,
        },
    ];
    consolidate(&segments)
}

#[test]
fn csv_with_geometry_carries_wkt_columns() {
    let path = std::env::temp_dir().join("milepost_export_geometry.csv");
    write_csv(&records(), &path, true).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "route_id,segment_id,stop_id1,stop_id2,distance,traversals,start_point,end_point,geometry"
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("r1,a-b-1,a,b,250"));
    assert!(first.contains("POINT (18.06 59.33)"));
    assert!(first.contains("LINESTRING (18.06 59.33, 18.061 59.331, 18.062 59.332)"));
    assert_eq!(content.lines().count(), 3);
}

#[test]
fn csv_without_geometry_keeps_endpoint_coordinates() {
    let path = std::env::temp_dir().join("milepost_export_flat.csv");
    write_csv(&records(), &path, false).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(
        lines.next().unwrap(),
        "route_id,segment_id,stop_id1,stop_id2,start_lat,start_lon,end_lat,end_lon,distance,traversals"
    );
    assert!(lines.next().unwrap().contains("59.33,18.06,59.332,18.062"));
}

#[test]
fn geojson_is_a_feature_collection() {
    let path = std::env::temp_dir().join("milepost_export.json");
    write_geojson(&records(), &path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["type"], "FeatureCollection");

    let features = value["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["properties"]["segment_id"], "a-b-1");
    assert_eq!(features[0]["properties"]["traversals"], 3);

    let coordinates = features[0]["geometry"]["coordinates"].as_array().unwrap();
    assert_eq!(coordinates.len(), 3);
    assert_eq!(coordinates[0][0], 18.06);
    assert_eq!(coordinates[0][1], 59.33);
}
