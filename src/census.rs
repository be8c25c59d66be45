//! ACS block-group demographics.
//!
//! Rows come from a flat CSV export of the Census API variables the analysis
//! uses (income, population, enrollment, vehicle access, labor force). The
//! Census encodes suppressed estimates as large negative sentinels; those and
//! empty cells decode to `None`.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use tracing::{debug, warn};

/// Anything at or below this is a Census suppression sentinel (-666666666 and
/// friends).
const SENTINEL_FLOOR: f64 = -666_666_665.0;

fn acs_value<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<f64> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|v| *v > SENTINEL_FLOOR))
}

/// One block group's raw ACS estimates.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockGroupRecord {
    #[serde(alias = "GEOID")]
    pub geoid: String,
    #[serde(deserialize_with = "acs_value")]
    pub median_household_income: Option<f64>,
    #[serde(deserialize_with = "acs_value")]
    pub total_population: Option<f64>,
    #[serde(deserialize_with = "acs_value", default)]
    pub total_enrollment: Option<f64>,
    #[serde(deserialize_with = "acs_value", default)]
    pub college_grad_enrollment: Option<f64>,
    #[serde(deserialize_with = "acs_value")]
    pub total_households: Option<f64>,
    #[serde(deserialize_with = "acs_value")]
    pub no_vehicle_owner: Option<f64>,
    #[serde(deserialize_with = "acs_value")]
    pub no_vehicle_renter: Option<f64>,
    #[serde(deserialize_with = "acs_value", default)]
    pub in_labor_force: Option<f64>,
    #[serde(deserialize_with = "acs_value", default)]
    pub unemployed: Option<f64>,
    #[serde(deserialize_with = "acs_value", default)]
    pub total_housing_units: Option<f64>,
}

impl BlockGroupRecord {
    /// Percent of households with no vehicle available (owner + renter).
    pub fn pct_no_vehicle(&self) -> Option<f64> {
        let households = self.total_households.filter(|h| *h > 0.0)?;
        let none = self.no_vehicle_owner? + self.no_vehicle_renter?;
        Some(none / households * 100.0)
    }

    /// Percent of population enrolled in graduate/professional school.
    /// A rough proxy for the student share around a university campus.
    pub fn pct_students(&self) -> Option<f64> {
        let population = self.total_population.filter(|p| *p > 0.0)?;
        let students = self.college_grad_enrollment?;
        Some(students / population * 100.0)
    }

    /// Unemployed share of the labor force, percent.
    pub fn unemployment_rate(&self) -> Option<f64> {
        let labor_force = self.in_labor_force.filter(|l| *l > 0.0)?;
        let unemployed = self.unemployed?;
        Some(unemployed / labor_force * 100.0)
    }
}

/// Loads block-group demographics, skipping unreadable rows.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_demographics(path: &Path) -> Result<Vec<BlockGroupRecord>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("opening demographics file {}", path.display()))?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "Skipping malformed demographics row");
            }
        }
    }

    debug!(kept = rows.len(), skipped, "Demographics loaded");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record() -> BlockGroupRecord {
        BlockGroupRecord {
            geoid: "060014220001".into(),
            median_household_income: Some(63_596.0),
            total_population: Some(1_800.0),
            total_enrollment: Some(700.0),
            college_grad_enrollment: Some(270.0),
            total_households: Some(900.0),
            no_vehicle_owner: Some(60.0),
            no_vehicle_renter: Some(240.0),
            in_labor_force: Some(1_000.0),
            unemployed: Some(55.0),
            total_housing_units: Some(950.0),
        }
    }

    #[test]
    fn test_derived_metrics() {
        let r = record();
        assert_relative_eq!(r.pct_no_vehicle().unwrap(), 33.333, epsilon = 0.001);
        assert_relative_eq!(r.pct_students().unwrap(), 15.0);
        assert_relative_eq!(r.unemployment_rate().unwrap(), 5.5);
    }

    #[test]
    fn test_zero_denominators_yield_none() {
        let mut r = record();
        r.total_households = Some(0.0);
        r.total_population = Some(0.0);
        r.in_labor_force = Some(0.0);
        assert!(r.pct_no_vehicle().is_none());
        assert!(r.pct_students().is_none());
        assert!(r.unemployment_rate().is_none());
    }

    #[test]
    fn test_sentinels_decode_to_none() {
        let csv_data = "geoid,median_household_income,total_population,total_enrollment,\
                        college_grad_enrollment,total_households,no_vehicle_owner,no_vehicle_renter,\
                        in_labor_force,unemployed,total_housing_units\n\
                        060014220001,-666666666,1800,,270,900,60,240,1000,55,950\n";
        let mut rdr = csv::Reader::from_reader(csv_data.as_bytes());
        let row: BlockGroupRecord = rdr.deserialize().next().unwrap().unwrap();

        assert!(row.median_household_income.is_none());
        assert!(row.total_enrollment.is_none());
        assert_eq!(row.total_population, Some(1800.0));
    }
}
