//! Service quality series: on-time performance and excess wait time.

use crate::catchment::IncomeCategory;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::warn;

/// Agency on-time performance goal, percent.
pub const OTP_GOAL_PERCENT: f64 = 91.0;

/// One fiscal year of system-level performance.
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceRecord {
    pub fiscal_year: i32,
    pub on_time_performance_pct: f64,
}

/// Estimated excess wait time at one station in one fiscal year.
#[derive(Debug, Clone, Deserialize)]
pub struct EquityRecord {
    pub fiscal_year: i32,
    pub station: String,
    pub estimated_ewt_min: f64,
}

/// Percent of scheduled service an operator actually ran in a year.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceLevelRecord {
    pub system: String,
    pub year: i32,
    pub service_pct: f64,
}

/// Mean EWT across the stations of one income category in one fiscal year.
#[derive(Debug, Clone, Serialize)]
pub struct EwtByIncome {
    pub fiscal_year: i32,
    pub income_category: IncomeCategory,
    pub mean_ewt_min: f64,
}

pub fn load_performance(path: &Path) -> Result<Vec<PerformanceRecord>> {
    read_rows(path).context("loading historical performance")
}

pub fn load_equity(path: &Path) -> Result<Vec<EquityRecord>> {
    read_rows(path).context("loading temporal equity series")
}

pub fn load_service_levels(path: &Path) -> Result<Vec<ServiceLevelRecord>> {
    read_rows(path).context("loading service levels")
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Joins per-station EWT estimates with catchment income categories and
/// averages within each (fiscal year, category) cell. Stations without a
/// catchment profile are skipped with a warning.
pub fn ewt_by_income(
    rows: &[EquityRecord],
    categories: &HashMap<String, IncomeCategory>,
) -> Vec<EwtByIncome> {
    let mut cells: BTreeMap<(i32, IncomeCategory), Vec<f64>> = BTreeMap::new();
    for row in rows {
        let Some(&category) = categories.get(&row.station) else {
            warn!(station = %row.station, "EWT row for station without a catchment profile");
            continue;
        };
        cells
            .entry((row.fiscal_year, category))
            .or_default()
            .push(row.estimated_ewt_min);
    }

    cells
        .into_iter()
        .map(|((fiscal_year, income_category), values)| EwtByIncome {
            fiscal_year,
            income_category,
            mean_ewt_min: values.iter().sum::<f64>() / values.len() as f64,
        })
        .collect()
}
