//! GTFS static feed ingestion.
//!
//! Reads the text tables of an extracted feed directory into typed rows.
//! Malformed rows are a data-quality issue, not a fatal one: they are skipped
//! with a warning and counted.

pub mod records;

pub use records::{Route, ShapePoint, Stop, StopTime, Trip};

use anyhow::{Context, Result, anyhow};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// An in-memory GTFS feed: the five tables the pipeline joins.
pub struct GtfsFeed {
    pub routes: Vec<Route>,
    pub trips: Vec<Trip>,
    pub stops: Vec<Stop>,
    pub stop_times: Vec<StopTime>,
    pub shapes: Vec<ShapePoint>,
}

impl GtfsFeed {
    /// Loads a feed from a directory of GTFS text tables.
    ///
    /// `shapes.txt` is optional per the GTFS spec; everything else must be
    /// present and readable.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn load(dir: &Path) -> Result<Self> {
        let routes = read_table(&dir.join("routes.txt"))?;
        let trips = read_table(&dir.join("trips.txt"))?;
        let stops = read_table(&dir.join("stops.txt"))?;
        let stop_times = read_table(&dir.join("stop_times.txt"))?;

        let shapes_path = dir.join("shapes.txt");
        let shapes = if shapes_path.exists() {
            read_table(&shapes_path)?
        } else {
            warn!("shapes.txt missing, route geometry will be empty");
            Vec::new()
        };

        let feed = GtfsFeed {
            routes,
            trips,
            stops,
            stop_times,
            shapes,
        };
        info!(
            routes = feed.routes.len(),
            trips = feed.trips.len(),
            stops = feed.stops.len(),
            stop_times = feed.stop_times.len(),
            shape_points = feed.shapes.len(),
            "GTFS feed loaded"
        );
        Ok(feed)
    }

    pub fn trips_by_id(&self) -> HashMap<&str, &Trip> {
        self.trips.iter().map(|t| (t.trip_id.as_str(), t)).collect()
    }

    pub fn routes_by_id(&self) -> HashMap<&str, &Route> {
        self.routes
            .iter()
            .map(|r| (r.route_id.as_str(), r))
            .collect()
    }

    /// Points of one shape, ordered by `shape_pt_sequence`.
    pub fn shape_points(&self, shape_id: &str) -> Vec<&ShapePoint> {
        let mut points: Vec<&ShapePoint> = self
            .shapes
            .iter()
            .filter(|p| p.shape_id == shape_id)
            .collect();
        points.sort_by_key(|p| p.shape_pt_sequence);
        points
    }
}

/// Reads one GTFS table, skipping rows that fail to deserialize.
fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening GTFS table {}", path.display()))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!(table = %path.display(), error = %e, "Skipping malformed GTFS row");
            }
        }
    }

    if skipped > 0 {
        warn!(table = %path.display(), skipped, kept = rows.len(), "GTFS table had malformed rows");
    }
    Ok(rows)
}

/// Parses a GTFS clock value (`HH:MM:SS`) to seconds since midnight of the
/// service day. Hours past 23 are valid: `25:30:00` is 1:30am the next
/// calendar day on the same service day.
pub fn parse_clock(value: &str) -> Result<u32> {
    let mut parts = value.trim().splitn(3, ':');
    let (h, m, s) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s)) => (h, m, s),
        _ => return Err(anyhow!("invalid GTFS time {value:?}")),
    };

    let hours: u32 = h.parse().with_context(|| format!("bad hours in {value:?}"))?;
    let minutes: u32 = m
        .parse()
        .with_context(|| format!("bad minutes in {value:?}"))?;
    let seconds: u32 = s
        .parse()
        .with_context(|| format!("bad seconds in {value:?}"))?;

    if minutes > 59 || seconds > 59 {
        return Err(anyhow!("out-of-range GTFS time {value:?}"));
    }

    Ok(hours * 3600 + minutes * 60 + seconds)
}
