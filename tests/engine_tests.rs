use std::{fs::File, io::Write, path::PathBuf};

use milepost::engine::{Engine, Error, FailureReason};
use milepost::gtfs::GtfsReader;
use milepost::repository::Repository;
use zip::{ZipWriter, write::SimpleFileOptions};

fn write_feed(name: &str, files: &[(&str, String)]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("milepost_{name}.zip"));
    let file = File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (file_name, content) in files {
        zip.start_file(*file_name, SimpleFileOptions::default())
            .unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn load(path: PathBuf) -> Repository {
    let reader = GtfsReader::new().from_zip(path);
    Repository::new().load_gtfs(reader).unwrap()
}

fn straight_shape(shape_id: &str, points: usize, step: f64) -> String {
    let mut content = String::from("shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n");
    for i in 0..points {
        content.push_str(&format!("{shape_id},0.0,{},{i}\n", i as f64 * step));
    }
    content
}

fn calendar_weekdays() -> String {
    "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
     wk,1,1,1,1,1,0,0,20250106,20250110\n"
        .to_string()
}

#[test]
fn a_simple_feed_produces_segments() {
    let path = write_feed(
        "engine_happy",
        &[
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\n\
                 s1,First,0.0,0.0\n\
                 s2,Second,0.0,0.002\n\
                 s3,Third,0.0,0.004\n"
                    .to_string(),
            ),
            (
                "routes.txt",
                "route_id,route_short_name,route_long_name,route_type\n\
                 r1,1,Main Street,3\n"
                    .to_string(),
            ),
            ("shapes.txt", straight_shape("sh1", 11, 0.0004)),
            (
                "trips.txt",
                "trip_id,route_id,service_id,shape_id,direction_id\n\
                 t1,r1,wk,sh1,0\n\
                 t2,r1,wk,sh1,0\n"
                    .to_string(),
            ),
            (
                "stop_times.txt",
                "trip_id,stop_id,stop_sequence\n\
                 t1,s1,1\nt1,s2,2\nt1,s3,3\n\
                 t2,s1,1\nt2,s2,2\nt2,s3,3\n"
                    .to_string(),
            ),
            ("calendar.txt", calendar_weekdays()),
        ],
    );
    let repository = load(path);

    let (_, service_ids) = repository.busiest_date().unwrap();
    let groups = repository.representative_trips(&service_ids);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].traversals, 2);

    let batch = Engine::new(&repository).run(&groups).unwrap();
    assert!(batch.failures.is_empty());
    assert_eq!(batch.trips_processed, 1);
    assert_eq!(batch.segments.len(), 2);

    let first = &batch.segments[0];
    assert_eq!(first.start_stop_id.as_ref(), "s1");
    assert_eq!(first.end_stop_id.as_ref(), "s2");
    assert_eq!(first.traversals, 2);
    // Two stops roughly 222 meters apart along the equator
    assert!((first.length.as_meters() - 222.0).abs() < 5.0);

    let second = &batch.segments[1];
    assert_eq!(second.start_stop_id.as_ref(), "s2");
    assert_eq!(second.end_stop_id.as_ref(), "s3");
}

#[test]
fn failures_are_collected_without_aborting_the_batch() {
    let path = write_feed(
        "engine_failures",
        &[
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\n\
                 s1,First,0.0,0.0\n\
                 s2,Second,0.0,0.002\n\
                 s3,Third,0.0,0.004\n"
                    .to_string(),
            ),
            (
                "routes.txt",
                "route_id,route_short_name,route_long_name,route_type\n\
                 r1,1,Main Street,3\n"
                    .to_string(),
            ),
            (
                "shapes.txt",
                // sh2 collapses to a single distinct vertex
                format!(
                    "{}sh2,1.0,1.0,0\nsh2,1.0,1.0,1\n",
                    straight_shape("sh1", 11, 0.0004)
                ),
            ),
            (
                "trips.txt",
                "trip_id,route_id,service_id,shape_id,direction_id\n\
                 t1,r1,wk,sh1,0\n\
                 t2,r1,wk,sh2,0\n\
                 t3,r1,wk,sh9,0\n\
                 t4,r1,wk,sh1,1\n"
                    .to_string(),
            ),
            (
                "stop_times.txt",
                "trip_id,stop_id,stop_sequence\n\
                 t1,s1,1\nt1,s2,2\nt1,s3,3\n\
                 t2,s1,1\nt2,s2,2\n\
                 t3,s1,1\nt3,s2,2\n\
                 t4,s1,1\n"
                    .to_string(),
            ),
            ("calendar.txt", calendar_weekdays()),
        ],
    );
    let repository = load(path);

    let (_, service_ids) = repository.busiest_date().unwrap();
    let groups = repository.representative_trips(&service_ids);
    assert_eq!(groups.len(), 4);

    let batch = Engine::new(&repository).run(&groups).unwrap();
    // The healthy trip still resolves
    assert_eq!(batch.segments.len(), 2);
    assert!(batch.segments.iter().all(|s| s.trip_id.as_ref() == "t1"));

    assert_eq!(batch.failures.len(), 3);
    let reason_of = |trip: &str| {
        batch
            .failures
            .iter()
            .find(|failure| failure.trip_id.as_ref() == trip)
            .map(|failure| failure.reason)
            .unwrap()
    };
    assert_eq!(reason_of("t2"), FailureReason::MalformedShape);
    assert_eq!(reason_of("t3"), FailureReason::ShapeMissing);
    assert_eq!(reason_of("t4"), FailureReason::TooFewStops);
    assert!(batch.failure_rate() > 0.5);
}

#[test]
fn stops_sharing_a_snap_point_yield_a_zero_length_segment() {
    let path = write_feed(
        "engine_zero",
        &[
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\n\
                 s1,Here,0.00001,0.002\n\
                 s2,Same,0.00001,0.002\n"
                    .to_string(),
            ),
            (
                "routes.txt",
                "route_id,route_short_name,route_long_name,route_type\n\
                 r1,1,Main Street,3\n"
                    .to_string(),
            ),
            ("shapes.txt", straight_shape("sh1", 11, 0.0004)),
            (
                "trips.txt",
                "trip_id,route_id,service_id,shape_id,direction_id\n\
                 t1,r1,wk,sh1,0\n"
                    .to_string(),
            ),
            (
                "stop_times.txt",
                "trip_id,stop_id,stop_sequence\nt1,s1,1\nt1,s2,2\n".to_string(),
            ),
            ("calendar.txt", calendar_weekdays()),
        ],
    );
    let repository = load(path);

    let (_, service_ids) = repository.busiest_date().unwrap();
    let groups = repository.representative_trips(&service_ids);
    let batch = Engine::new(&repository).run(&groups).unwrap();

    assert!(batch.failures.is_empty());
    assert_eq!(batch.segments.len(), 1);
    assert_eq!(batch.segments[0].length.as_meters(), 0.0);
    assert_eq!(batch.segments[0].geometry.len(), 2);
}

#[test]
fn a_feed_without_geometry_aborts_the_run() {
    let path = write_feed(
        "engine_no_shapes",
        &[
            (
                "stops.txt",
                "stop_id,stop_name,stop_lat,stop_lon\ns1,First,0.0,0.0\ns2,Second,0.0,0.002\n"
                    .to_string(),
            ),
            (
                "routes.txt",
                "route_id,route_short_name,route_long_name,route_type\nr1,1,Main Street,3\n"
                    .to_string(),
            ),
            (
                "trips.txt",
                "trip_id,route_id,service_id,shape_id,direction_id\nt1,r1,wk,sh1,0\n".to_string(),
            ),
            (
                "stop_times.txt",
                "trip_id,stop_id,stop_sequence\nt1,s1,1\nt1,s2,2\n".to_string(),
            ),
            ("calendar.txt", calendar_weekdays()),
        ],
    );
    let repository = load(path);

    let (_, service_ids) = repository.busiest_date().unwrap();
    let groups = repository.representative_trips(&service_ids);
    assert!(!groups.is_empty());

    let result = Engine::new(&repository).run(&groups);
    assert!(matches!(result, Err(Error::MissingGeometry)));
}
