//! Output record types for the report artifacts.

use crate::catchment::IncomeCategory;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row of the catchment demographics CSV.
#[derive(Debug, Clone, Serialize)]
pub struct CatchmentDemographicsRow {
    pub station: String,
    pub stop_count: usize,
    pub block_group_count: usize,
    pub total_population: f64,
    pub median_household_income: Option<f64>,
    pub pct_no_vehicle: Option<f64>,
    pub pct_students: Option<f64>,
    pub unemployment_rate: Option<f64>,
    pub income_category: IncomeCategory,
}

/// Everything the station comparison artifacts need about one station:
/// ridership change, bus connectivity, and catchment demographics.
#[derive(Debug, Clone, Serialize)]
pub struct StationComparison {
    pub station: String,
    pub lat: f64,
    pub lon: f64,

    pub baseline_year: i32,
    pub latest_year: i32,
    pub baseline_riders: f64,
    pub latest_riders: f64,
    pub loss: f64,
    pub pct_loss: f64,
    pub retention: f64,

    pub route_count: usize,
    pub peak_trips_per_hour: f64,

    pub median_household_income: Option<f64>,
    pub pct_no_vehicle: Option<f64>,
    pub income_category: IncomeCategory,
}

/// Summary entry for the report index listing.
#[derive(Debug, Clone, Serialize)]
pub struct ReportIndexEntry {
    pub station: String,
    pub pct_loss: f64,
    pub retention: f64,
    pub route_count: usize,
    pub income_category: IncomeCategory,
}

/// Top-level index of the generated report, written as
/// `station_comparison.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportIndex {
    pub generated_at: DateTime<Utc>,
    pub baseline_year: i32,
    pub stations: Vec<ReportIndexEntry>,
}

/// One row of the commute flows CSV.
#[derive(Debug, Clone, Serialize)]
pub struct CommuteFlowRow {
    pub year: i32,
    pub total_jobs: u64,
    pub live_local: u64,
    pub commute_in: u64,
    pub pct_commute_in: f64,
}
