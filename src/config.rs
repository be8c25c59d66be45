//! Station list and input-file conventions.
//!
//! All inputs are local files; the data directory follows fixed file names so
//! the subcommands can share one `--data-dir` flag.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walkable catchment radius: 0.5 miles in meters.
pub const BUFFER_RADIUS_METERS: f64 = 804.672;

/// Morning peak window, seconds since midnight (07:00–09:00).
pub const PEAK_WINDOW_SECONDS: (u32, u32) = (7 * 3600, 9 * 3600);

/// Ridership and income comparisons are anchored to this year.
pub const BASELINE_YEAR: i32 = 2019;

/// A catchment is "Low-Income Area" below this fraction of the region-wide
/// population-weighted median household income.
pub const LOW_INCOME_RATIO: f64 = 0.8;

/// Pre-pandemic transit commute mode share, used to size transit-rider
/// estimates from worker counts (ACS table B08301).
pub const BASELINE_TRANSIT_SHARE: f64 = 0.13;

/// A rail station under study.
#[derive(Debug, Clone, Deserialize)]
pub struct Station {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
}

impl Station {
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// Loads the station list from a `station,lat,lon` CSV.
///
/// # Errors
///
/// Fails on unreadable files, malformed rows, or coordinates outside the
/// valid lat/lon ranges.
pub fn load_stations(path: &Path) -> Result<Vec<Station>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening stations file {}", path.display()))?;

    let mut stations = Vec::new();
    for row in rdr.deserialize() {
        let station: Station = row?;
        if !station.lat.is_finite() || !station.lon.is_finite() {
            bail!("station {} has non-finite coordinates", station.station);
        }
        if station.lat.abs() > 90.0 || station.lon.abs() > 180.0 {
            bail!(
                "station {} has out-of-range coordinates ({}, {})",
                station.station,
                station.lat,
                station.lon
            );
        }
        stations.push(station);
    }

    if stations.is_empty() {
        bail!("stations file {} contains no rows", path.display());
    }

    debug!(count = stations.len(), "Stations loaded");
    Ok(stations)
}

/// Conventional file names under the data directory.
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn demographics(&self) -> PathBuf {
        self.root.join("block_group_demographics.csv")
    }

    pub fn block_groups(&self) -> PathBuf {
        self.root.join("block_groups.geojson")
    }

    pub fn station_ridership(&self) -> PathBuf {
        self.root.join("station_ridership.csv")
    }

    pub fn system_ridership(&self) -> PathBuf {
        self.root.join("system_ridership.csv")
    }

    pub fn performance(&self) -> PathBuf {
        self.root.join("historical_performance.csv")
    }

    pub fn temporal_equity(&self) -> PathBuf {
        self.root.join("temporal_equity.csv")
    }

    pub fn service_levels(&self) -> PathBuf {
        self.root.join("service_levels.csv")
    }

    pub fn mode_share(&self) -> PathBuf {
        self.root.join("mode_share.csv")
    }

    pub fn wfh(&self) -> PathBuf {
        self.root.join("wfh_workers.csv")
    }

    pub fn lodes(&self, year: i32) -> PathBuf {
        self.root.join(format!("lodes_od_{year}.csv.gz"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_stations() {
        let path = write_temp(
            "ridership_atlas_stations_ok.csv",
            "station,lat,lon\nDowntown Berkeley,37.8703,-122.2680\nAshby,37.8530,-122.2697\n",
        );
        let stations = load_stations(&path).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].station, "Downtown Berkeley");
        assert_eq!(stations[1].point().x(), -122.2697);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_stations_rejects_bad_coords() {
        let path = write_temp(
            "ridership_atlas_stations_bad.csv",
            "station,lat,lon\nNowhere,137.0,-122.0\n",
        );
        assert!(load_stations(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_load_stations_rejects_empty() {
        let path = write_temp("ridership_atlas_stations_empty.csv", "station,lat,lon\n");
        assert!(load_stations(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_data_paths() {
        let paths = DataPaths::new("data");
        assert!(paths.lodes(2019).ends_with("lodes_od_2019.csv.gz"));
        assert!(paths.demographics().ends_with("block_group_demographics.csv"));
    }
}
