//! A fast, local-first engine for computing stop spacings from GTFS transit
//! data.
//!
//! The pipeline: stream a feed into a [`repository::Repository`], pick the
//! busiest service date, group its bus trips by route, direction and shape,
//! then let the [`engine::Engine`] snap every representative trip's stops
//! onto its shape and slice the shape into stop-to-stop segments.
//!
//! ```no_run
//! use milepost::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let reader = GtfsReader::new().from_zip("gtfs.zip".into());
//! let repository = Repository::new().load_gtfs(reader)?;
//!
//! let (date, service_ids) = repository.busiest_date().ok_or("no service calendar")?;
//! println!("Busiest date: {date}");
//!
//! let groups = repository.representative_trips(&service_ids);
//! let batch = Engine::new(&repository).run(&groups)?;
//! println!(
//!     "{} segments, {} trips failed",
//!     batch.segments.len(),
//!     batch.failures.len()
//! );
//!
//! let records = milepost::stats::consolidate(&batch.segments);
//! milepost::export::write_geojson(&records, "segments.json")?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod export;
pub mod gtfs;
pub mod repository;
pub mod shared;
pub mod stats;

pub mod prelude {
    pub use crate::engine::{Batch, Config as EngineConfig, Engine, Segment, TripFailure};
    pub use crate::gtfs::GtfsReader;
    pub use crate::repository::{Repository, TripGroup};
    pub use crate::shared::{Coordinate, Distance};
    pub use crate::stats::{SegmentRecord, SpacingSummary};
}
