//! Ridership series: per-station change metrics and system-level
//! normalization against the baseline year.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Average weekday entries/exits for one station in one year.
#[derive(Debug, Clone, Deserialize)]
pub struct StationYearRidership {
    pub station: String,
    pub year: i32,
    pub riders: f64,
}

/// Annual ridership for a whole system (rail operator, bus operator).
#[derive(Debug, Clone, Deserialize)]
pub struct SystemYearRidership {
    pub system: String,
    pub year: i32,
    pub riders: f64,
}

/// Baseline-to-latest change for one station.
#[derive(Debug, Clone, Serialize)]
pub struct RidershipChange {
    pub station: String,
    pub baseline_year: i32,
    pub latest_year: i32,
    pub baseline_riders: f64,
    pub latest_riders: f64,
    pub loss: f64,
    pub pct_loss: f64,
    pub retention: f64,
}

/// A year's ridership as percent of the system's baseline year.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedPoint {
    pub year: i32,
    pub pct_of_baseline: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSeries {
    pub system: String,
    pub points: Vec<NormalizedPoint>,
}

pub fn load_station_ridership(path: &Path) -> Result<Vec<StationYearRidership>> {
    read_rows(path).context("loading station ridership")
}

pub fn load_system_ridership(path: &Path) -> Result<Vec<SystemYearRidership>> {
    read_rows(path).context("loading system ridership")
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    debug!(path = %path.display(), rows = rows.len(), "Ridership rows loaded");
    Ok(rows)
}

/// Change metrics per station between the baseline year and each station's
/// latest observed year. Stations missing the baseline year are skipped with
/// a warning.
pub fn ridership_changes(
    rows: &[StationYearRidership],
    baseline_year: i32,
) -> Vec<RidershipChange> {
    // station -> year -> riders, BTreeMaps for deterministic iteration
    let mut by_station: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    for row in rows {
        by_station
            .entry(row.station.as_str())
            .or_default()
            .insert(row.year, row.riders);
    }

    let mut changes = Vec::new();
    for (station, years) in by_station {
        let Some(&baseline_riders) = years.get(&baseline_year) else {
            warn!(station, baseline_year, "No baseline-year ridership, skipping station");
            continue;
        };
        // BTreeMap: last entry is the latest year
        let (&latest_year, &latest_riders) = years
            .iter()
            .next_back()
            .expect("station map has at least the baseline row");
        if baseline_riders <= 0.0 {
            warn!(station, "Non-positive baseline ridership, skipping station");
            continue;
        }

        let loss = baseline_riders - latest_riders;
        let pct_loss = loss / baseline_riders * 100.0;
        changes.push(RidershipChange {
            station: station.to_string(),
            baseline_year,
            latest_year,
            baseline_riders,
            latest_riders,
            loss,
            pct_loss,
            retention: 100.0 - pct_loss,
        });
    }
    changes
}

/// Normalizes each system's annual series to percent of its baseline year.
/// A system without a baseline-year row is skipped with a warning.
pub fn normalize_systems(rows: &[SystemYearRidership], baseline_year: i32) -> Vec<SystemSeries> {
    let mut by_system: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    for row in rows {
        by_system
            .entry(row.system.as_str())
            .or_default()
            .insert(row.year, row.riders);
    }

    let mut series = Vec::new();
    for (system, years) in by_system {
        let Some(&baseline) = years.get(&baseline_year) else {
            warn!(system, baseline_year, "No baseline-year row, skipping system");
            continue;
        };
        if baseline <= 0.0 {
            warn!(system, "Non-positive baseline ridership, skipping system");
            continue;
        }

        series.push(SystemSeries {
            system: system.to_string(),
            points: years
                .iter()
                .map(|(&year, &riders)| NormalizedPoint {
                    year,
                    pct_of_baseline: riders / baseline * 100.0,
                })
                .collect(),
        });
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(station: &str, year: i32, riders: f64) -> StationYearRidership {
        StationYearRidership {
            station: station.into(),
            year,
            riders,
        }
    }

    #[test]
    fn test_ridership_changes() {
        let rows = vec![
            row("Downtown Berkeley", 2019, 11_566.0),
            row("Downtown Berkeley", 2021, 1_434.0),
            row("Downtown Berkeley", 2024, 4_170.0),
            row("Ashby", 2019, 7_522.0),
            row("Ashby", 2024, 2_264.0),
        ];
        let changes = ridership_changes(&rows, 2019);
        assert_eq!(changes.len(), 2);

        // BTreeMap order: Ashby first
        let ashby = &changes[0];
        assert_eq!(ashby.station, "Ashby");
        assert_eq!(ashby.latest_year, 2024);
        assert_relative_eq!(ashby.loss, 5_258.0);
        assert_relative_eq!(ashby.pct_loss + ashby.retention, 100.0);

        let downtown = &changes[1];
        assert_relative_eq!(downtown.loss, 7_396.0);
        assert_relative_eq!(downtown.pct_loss, 63.95, epsilon = 0.01);
    }

    #[test]
    fn test_missing_baseline_skipped() {
        let rows = vec![row("New Station", 2022, 900.0), row("Old", 2019, 100.0)];
        let changes = ridership_changes(&rows, 2019);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].station, "Old");
    }

    #[test]
    fn test_normalize_systems() {
        let rows = vec![
            SystemYearRidership {
                system: "BART Berkeley".into(),
                year: 2019,
                riders: 24_982.0,
            },
            SystemYearRidership {
                system: "BART Berkeley".into(),
                year: 2021,
                riders: 3_098.0,
            },
        ];
        let series = normalize_systems(&rows, 2019);
        assert_eq!(series.len(), 1);

        let points = &series[0].points;
        assert_relative_eq!(points[0].pct_of_baseline, 100.0);
        assert_relative_eq!(points[1].pct_of_baseline, 12.4, epsilon = 0.01);
    }

    #[test]
    fn test_normalize_skips_system_without_baseline() {
        let rows = vec![SystemYearRidership {
            system: "Ferry".into(),
            year: 2021,
            riders: 500.0,
        }];
        assert!(normalize_systems(&rows, 2019).is_empty());
    }
}
