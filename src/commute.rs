//! LEHD LODES commute flows: where the study area's workers live.
//!
//! The OD files are block-to-block job counts, distributed gzipped. They are
//! large (the statewide file runs to millions of rows), so filtering to the
//! configured workplace tracts happens while streaming the decoder, the same
//! chunked-filter approach the source data demands.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Workplace census tracts of the study area (11-digit GEOIDs), the
/// Berkeley tract list of the source analysis.
pub const DEFAULT_WORKPLACE_TRACTS: &[&str] = &[
    "06001400500",
    "06001400700",
    "06001421800",
    "06001421900",
    "06001422200",
    "06001422300",
    "06001422400",
    "06001422500",
    "06001422800",
    "06001422901",
    "06001423000",
    "06001423100",
    "06001423400",
    "06001423500",
    "06001423601",
    "06001423602",
    "06001423901",
    "06001423902",
    "06001424001",
];

/// One origin-destination row of a LODES file. `S000` is total jobs for the
/// block pair.
#[derive(Debug, Clone, Deserialize)]
pub struct OdRecord {
    pub w_geocode: String,
    pub h_geocode: String,
    #[serde(rename = "S000")]
    pub total_jobs: u64,
}

impl OdRecord {
    /// Workplace tract: first 11 digits of the 15-digit block geocode.
    pub fn workplace_tract(&self) -> &str {
        tract_prefix(&self.w_geocode)
    }

    /// Home tract of the worker.
    pub fn home_tract(&self) -> &str {
        tract_prefix(&self.h_geocode)
    }

    /// Home county: state + county FIPS (5 digits).
    pub fn home_county(&self) -> &str {
        let end = self.h_geocode.len().min(5);
        &self.h_geocode[..end]
    }
}

fn tract_prefix(geocode: &str) -> &str {
    let end = geocode.len().min(11);
    &geocode[..end]
}

/// Jobs flowing in from one origin county.
#[derive(Debug, Clone, Serialize)]
pub struct CountyFlow {
    pub county: String,
    pub county_name: String,
    pub jobs: u64,
    pub pct_of_jobs: f64,
}

/// Commute partition for one LODES year.
#[derive(Debug, Clone, Serialize)]
pub struct CommuteSummary {
    pub year: i32,
    pub total_jobs: u64,
    /// Workers whose home tract is also a study-area tract.
    pub live_local: u64,
    /// Workers commuting in from outside the study tracts.
    pub commute_in: u64,
    pub pct_commute_in: f64,
    #[serde(skip)]
    pub top_origin_counties: Vec<CountyFlow>,
}

/// Year-over-year commuter change.
#[derive(Debug, Clone, Serialize)]
pub struct CommuteDelta {
    pub pre_year: i32,
    pub post_year: i32,
    pub commuters_lost: i64,
    pub pct_lost: f64,
    /// Share of the lost commuters assumed to have been transit riders.
    pub estimated_transit_riders_lost: i64,
}

/// Streams a gzipped LODES OD file, keeping only rows whose workplace tract
/// is in `workplace_tracts`. Malformed rows are skipped with a warning.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_od_records(path: &Path, workplace_tracts: &HashSet<String>) -> Result<Vec<OdRecord>> {
    let file =
        File::open(path).with_context(|| format!("opening LODES file {}", path.display()))?;
    let decoder = MultiGzDecoder::new(file);
    let mut rdr = csv::Reader::from_reader(decoder);

    let mut records = Vec::new();
    let mut scanned = 0usize;
    let mut skipped = 0usize;
    for result in rdr.deserialize() {
        scanned += 1;
        let record: OdRecord = match result {
            Ok(r) => r,
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping malformed LODES row");
                continue;
            }
        };
        if workplace_tracts.contains(record.workplace_tract()) {
            records.push(record);
        }
    }

    info!(
        scanned,
        kept = records.len(),
        skipped,
        "LODES rows filtered to study-area workplaces"
    );
    Ok(records)
}

/// Partitions the filtered OD rows into live-local vs commute-in and ranks
/// origin counties.
pub fn summarize(
    records: &[OdRecord],
    year: i32,
    workplace_tracts: &HashSet<String>,
    top_n: usize,
) -> CommuteSummary {
    let mut total_jobs = 0u64;
    let mut live_local = 0u64;
    let mut county_jobs: BTreeMap<&str, u64> = BTreeMap::new();

    for record in records {
        total_jobs += record.total_jobs;
        if workplace_tracts.contains(record.home_tract()) {
            live_local += record.total_jobs;
        }
        *county_jobs.entry(record.home_county()).or_default() += record.total_jobs;
    }

    let commute_in = total_jobs - live_local;
    let pct_commute_in = if total_jobs > 0 {
        commute_in as f64 / total_jobs as f64 * 100.0
    } else {
        0.0
    };

    let mut counties: Vec<(&str, u64)> = county_jobs.into_iter().collect();
    counties.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let top_origin_counties = counties
        .into_iter()
        .take(top_n)
        .map(|(county, jobs)| CountyFlow {
            county: county.to_string(),
            county_name: county_name(county).unwrap_or("Unknown county").to_string(),
            jobs,
            pct_of_jobs: if total_jobs > 0 {
                jobs as f64 / total_jobs as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();

    CommuteSummary {
        year,
        total_jobs,
        live_local,
        commute_in,
        pct_commute_in,
        top_origin_counties,
    }
}

/// Commuter loss between the pre and post summaries, with a transit-rider
/// estimate at the given mode share.
pub fn delta(pre: &CommuteSummary, post: &CommuteSummary, transit_share: f64) -> CommuteDelta {
    let lost = pre.commute_in as i64 - post.commute_in as i64;
    let pct_lost = if pre.commute_in > 0 {
        lost as f64 / pre.commute_in as f64 * 100.0
    } else {
        0.0
    };

    CommuteDelta {
        pre_year: pre.year,
        post_year: post.year,
        commuters_lost: lost,
        pct_lost,
        estimated_transit_riders_lost: (lost as f64 * transit_share) as i64,
    }
}

/// Bay Area county names for the origin table.
fn county_name(fips: &str) -> Option<&'static str> {
    match fips {
        "06001" => Some("Alameda County"),
        "06013" => Some("Contra Costa County"),
        "06075" => Some("San Francisco County"),
        "06081" => Some("San Mateo County"),
        "06085" => Some("Santa Clara County"),
        "06095" => Some("Solano County"),
        "06097" => Some("Sonoma County"),
        "06041" => Some("Marin County"),
        "06055" => Some("Napa County"),
        _ => None,
    }
}

/// The default workplace tract set as owned strings.
pub fn default_workplace_tracts() -> HashSet<String> {
    DEFAULT_WORKPLACE_TRACTS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    fn od(w: &str, h: &str, jobs: u64) -> OdRecord {
        OdRecord {
            w_geocode: w.into(),
            h_geocode: h.into(),
            total_jobs: jobs,
        }
    }

    fn tracts() -> HashSet<String> {
        HashSet::from(["06001422200".to_string(), "06001422300".to_string()])
    }

    #[test]
    fn test_summarize_partition() {
        let records = vec![
            // lives and works inside the study tracts
            od("060014222001001", "060014223002002", 40),
            // commutes in from San Francisco
            od("060014222001001", "060750101001001", 35),
            // commutes in from Contra Costa
            od("060014223001001", "060133200001001", 25),
        ];
        let summary = summarize(&records, 2019, &tracts(), 10);

        assert_eq!(summary.total_jobs, 100);
        assert_eq!(summary.live_local, 40);
        assert_eq!(summary.commute_in, 60);
        assert_relative_eq!(summary.pct_commute_in, 60.0);
        // live_local + commute_in partitions the total
        assert_eq!(summary.live_local + summary.commute_in, summary.total_jobs);

        assert_eq!(summary.top_origin_counties[0].county_name, "Alameda County");
        assert_eq!(summary.top_origin_counties[1].county, "06075");
    }

    #[test]
    fn test_delta() {
        let pre = summarize(
            &[od("060014222001001", "060750101001001", 1000)],
            2019,
            &tracts(),
            5,
        );
        let post = summarize(
            &[od("060014222001001", "060750101001001", 600)],
            2021,
            &tracts(),
            5,
        );
        let d = delta(&pre, &post, 0.13);

        assert_eq!(d.commuters_lost, 400);
        assert_relative_eq!(d.pct_lost, 40.0);
        assert_eq!(d.estimated_transit_riders_lost, 52);
    }

    #[test]
    fn test_load_od_records_filters_gzip() {
        let path = std::env::temp_dir().join("ridership_atlas_lodes.csv.gz");
        let file = File::create(&path).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(
            b"w_geocode,h_geocode,S000,SA01\n\
              060014222001001,060750101001001,12,3\n\
              069999999001001,060750101001001,99,1\n",
        )
        .unwrap();
        enc.finish().unwrap();

        let records = load_od_records(&path, &tracts()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_jobs, 12);

        std::fs::remove_file(path).unwrap();
    }
}
