//! Station catchment construction and demographic aggregation.
//!
//! Each station gets a walkable buffer; block groups whose footprint
//! intersects the buffer contribute to the catchment's demographic profile,
//! weighted by population where the metric is a per-household or per-person
//! rate.

use crate::census::BlockGroupRecord;
use crate::config::Station;
use crate::geometry::{BlockGroupZone, buffer_polygon};
use crate::spatial::StopIndex;
use geo::{Intersects, Polygon};
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// Income classification of a station catchment, relative to the
/// region-wide weighted median.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IncomeCategory {
    #[serde(rename = "Low-Income Area")]
    LowIncome,
    #[serde(rename = "Non-Low-Income Area")]
    NonLowIncome,
}

impl fmt::Display for IncomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncomeCategory::LowIncome => write!(f, "Low-Income Area"),
            IncomeCategory::NonLowIncome => write!(f, "Non-Low-Income Area"),
        }
    }
}

/// A station's catchment: buffer geometry plus aggregated demographics.
#[derive(Debug, Clone)]
pub struct CatchmentProfile {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    pub buffer: Polygon<f64>,
    pub stop_count: usize,
    pub block_group_count: usize,
    pub total_population: f64,
    /// Population-weighted mean of block-group median household incomes.
    pub median_household_income: Option<f64>,
    /// Population-weighted percent of households with no vehicle.
    pub pct_no_vehicle: Option<f64>,
    pub pct_students: Option<f64>,
    pub unemployment_rate: Option<f64>,
    pub income_category: IncomeCategory,
}

impl CatchmentProfile {
    /// GeoJSON feature for the catchments artifact.
    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert("station".into(), json!(self.station));
        properties.insert("stop_count".into(), json!(self.stop_count));
        properties.insert("block_group_count".into(), json!(self.block_group_count));
        properties.insert("total_population".into(), json!(self.total_population));
        properties.insert(
            "median_household_income".into(),
            json!(self.median_household_income),
        );
        properties.insert("pct_no_vehicle".into(), json!(self.pct_no_vehicle));
        properties.insert(
            "income_category".into(),
            json!(self.income_category.to_string()),
        );

        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&self.buffer))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Collects catchment features into a `FeatureCollection`.
pub fn catchments_to_geojson(profiles: &[CatchmentProfile]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: profiles.iter().map(CatchmentProfile::to_feature).collect(),
        foreign_members: None,
    }
}

/// Region-wide population-weighted median household income, the reference
/// for income classification. Block groups with missing income or zero
/// population are excluded.
pub fn regional_median_income(blocks: &[BlockGroupRecord]) -> Option<f64> {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for block in blocks {
        let (Some(income), Some(pop)) = (block.median_household_income, block.total_population)
        else {
            continue;
        };
        if pop <= 0.0 {
            continue;
        }
        weighted += income * pop;
        weight += pop;
    }
    (weight > 0.0).then(|| weighted / weight)
}

/// Builds a catchment profile per station.
#[tracing::instrument(skip_all, fields(stations = stations.len(), radius_meters))]
pub fn build_catchments(
    stations: &[Station],
    stop_index: &StopIndex,
    zones: &[BlockGroupZone],
    demographics: &[BlockGroupRecord],
    radius_meters: f64,
    low_income_ratio: f64,
) -> Vec<CatchmentProfile> {
    let by_geoid: HashMap<&str, &BlockGroupRecord> = demographics
        .iter()
        .map(|d| (d.geoid.as_str(), d))
        .collect();
    let regional_income = regional_median_income(demographics);

    let mut profiles = Vec::with_capacity(stations.len());
    for station in stations {
        let buffer = buffer_polygon(station.point(), radius_meters);
        let stop_count = stop_index.within_radius(station.point(), radius_meters).len();

        let mut member_records: Vec<&BlockGroupRecord> = Vec::new();
        for zone in zones {
            if !zone.geometry.intersects(&buffer) {
                continue;
            }
            match by_geoid.get(zone.geoid.as_str()) {
                Some(record) => member_records.push(record),
                None => {
                    warn!(geoid = %zone.geoid, "Block group has geometry but no demographics row")
                }
            }
        }

        if member_records.is_empty() {
            warn!(station = %station.station, "Catchment intersects no block groups");
        }

        let total_population: f64 = member_records
            .iter()
            .filter_map(|r| r.total_population)
            .sum();
        let median_household_income = weighted_rate(&member_records, |r| r.median_household_income);
        let pct_no_vehicle = weighted_rate(&member_records, |r| r.pct_no_vehicle());
        let pct_students = unweighted_mean(&member_records, |r| r.pct_students());
        let unemployment_rate = unweighted_mean(&member_records, |r| r.unemployment_rate());

        let income_category = match (median_household_income, regional_income) {
            (Some(income), Some(regional)) if income < low_income_ratio * regional => {
                IncomeCategory::LowIncome
            }
            _ => IncomeCategory::NonLowIncome,
        };

        info!(
            station = %station.station,
            stop_count,
            block_groups = member_records.len(),
            income = ?median_household_income,
            category = %income_category,
            "Catchment built"
        );

        profiles.push(CatchmentProfile {
            station: station.station.clone(),
            lat: station.lat,
            lon: station.lon,
            buffer,
            stop_count,
            block_group_count: member_records.len(),
            total_population,
            median_household_income,
            pct_no_vehicle,
            pct_students,
            unemployment_rate,
            income_category,
        });
    }

    profiles
}

/// Income categories keyed by station name, for joins against series data.
pub fn income_categories(profiles: &[CatchmentProfile]) -> HashMap<String, IncomeCategory> {
    profiles
        .iter()
        .map(|p| (p.station.clone(), p.income_category))
        .collect()
}

fn weighted_rate(
    records: &[&BlockGroupRecord],
    metric: impl Fn(&BlockGroupRecord) -> Option<f64>,
) -> Option<f64> {
    let mut weighted = 0.0;
    let mut weight = 0.0;
    for record in records {
        let (Some(value), Some(pop)) = (metric(record), record.total_population) else {
            continue;
        };
        if pop <= 0.0 {
            continue;
        }
        weighted += value * pop;
        weight += pop;
    }
    (weight > 0.0).then(|| weighted / weight)
}

fn unweighted_mean(
    records: &[&BlockGroupRecord],
    metric: impl Fn(&BlockGroupRecord) -> Option<f64>,
) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| metric(r)).collect();
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::BlockGroupRecord;
    use crate::gtfs::Stop;
    use approx::assert_relative_eq;
    use geo::{LineString, MultiPolygon, Polygon};

    fn block(geoid: &str, income: Option<f64>, population: Option<f64>) -> BlockGroupRecord {
        BlockGroupRecord {
            geoid: geoid.into(),
            median_household_income: income,
            total_population: population,
            total_enrollment: None,
            college_grad_enrollment: None,
            total_households: Some(1000.0),
            no_vehicle_owner: Some(100.0),
            no_vehicle_renter: Some(100.0),
            in_labor_force: Some(1000.0),
            unemployed: Some(50.0),
            total_housing_units: None,
        }
    }

    fn square(geoid: &str, west: f64, south: f64, size: f64) -> BlockGroupZone {
        let ring = vec![
            (west, south),
            (west + size, south),
            (west + size, south + size),
            (west, south + size),
            (west, south),
        ];
        BlockGroupZone {
            geoid: geoid.into(),
            geometry: MultiPolygon(vec![Polygon::new(LineString::from(ring), vec![])]),
        }
    }

    fn station(name: &str, lat: f64, lon: f64) -> Station {
        Station {
            station: name.into(),
            lat,
            lon,
        }
    }

    #[test]
    fn test_regional_median_income_weighting() {
        let blocks = vec![
            block("a", Some(60_000.0), Some(3000.0)),
            block("b", Some(120_000.0), Some(1000.0)),
            block("c", None, Some(5000.0)),       // missing income excluded
            block("d", Some(90_000.0), Some(0.0)), // zero population excluded
        ];
        // (60k*3000 + 120k*1000) / 4000 = 75k
        assert_relative_eq!(regional_median_income(&blocks).unwrap(), 75_000.0);
    }

    #[test]
    fn test_build_catchments_weighted_aggregation() {
        // One square around the station, one far away
        let zones = vec![
            square("near1", -122.28, 37.86, 0.02),
            square("near2", -122.275, 37.865, 0.01),
            square("faraway", -121.0, 36.0, 0.02),
        ];
        let demographics = vec![
            block("near1", Some(60_000.0), Some(3000.0)),
            block("near2", Some(120_000.0), Some(1000.0)),
            block("faraway", Some(200_000.0), Some(9000.0)),
        ];
        let stations = vec![station("Test", 37.8703, -122.2680)];
        let index = StopIndex::build(&[Stop {
            stop_id: "s1".into(),
            stop_name: None,
            stop_lat: 37.8703,
            stop_lon: -122.2690,
        }]);

        let profiles = build_catchments(&stations, &index, &zones, &demographics, 804.672, 0.8);
        assert_eq!(profiles.len(), 1);
        let p = &profiles[0];

        assert_eq!(p.block_group_count, 2);
        assert_eq!(p.stop_count, 1);
        assert_relative_eq!(p.total_population, 4000.0);
        assert_relative_eq!(p.median_household_income.unwrap(), 75_000.0);
        // Both blocks have 20% no-vehicle households
        assert_relative_eq!(p.pct_no_vehicle.unwrap(), 20.0);

        // Regional weighted median is dominated by "faraway" at 200k:
        // (60k*3000 + 120k*1000 + 200k*9000) / 13000 = 161.5k; 75k < 0.8 * that
        assert_eq!(p.income_category, IncomeCategory::LowIncome);
    }

    #[test]
    fn test_empty_catchment_is_non_low_income() {
        let stations = vec![station("Isolated", 40.0, -100.0)];
        let index = StopIndex::build(&[]);
        let profiles = build_catchments(&stations, &index, &[], &[], 804.672, 0.8);

        let p = &profiles[0];
        assert_eq!(p.block_group_count, 0);
        assert!(p.median_household_income.is_none());
        assert_eq!(p.income_category, IncomeCategory::NonLowIncome);
    }

    #[test]
    fn test_catchment_geojson_properties() {
        let stations = vec![station("Test", 37.8703, -122.2680)];
        let index = StopIndex::build(&[]);
        let profiles = build_catchments(&stations, &index, &[], &[], 500.0, 0.8);

        let collection = catchments_to_geojson(&profiles);
        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(
            feature.property("station").and_then(|v| v.as_str()),
            Some("Test")
        );
        assert!(feature.geometry.is_some());
    }
}
