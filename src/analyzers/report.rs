//! Report orchestration: load inputs, run the spatial and temporal joins,
//! write every artifact.
//!
//! Each `run_*` function backs one CLI subcommand; `run_report` chains all
//! of them over a single loaded context so the GTFS tables are only read
//! once.

use crate::analyzers::types::{
    CatchmentDemographicsRow, CommuteFlowRow, ReportIndex, ReportIndexEntry, StationComparison,
};
use crate::catchment::{self, CatchmentProfile};
use crate::census::{self, BlockGroupRecord};
use crate::charts;
use crate::commute;
use crate::config::{
    BASELINE_TRANSIT_SHARE, BASELINE_YEAR, DataPaths, LOW_INCOME_RATIO, Station, load_stations,
};
use crate::connectivity::{self, StationConnectivity};
use crate::geometry::{self, BlockGroupZone};
use crate::gtfs::GtfsFeed;
use crate::modeshift;
use crate::output;
use crate::performance;
use crate::ridership;
use crate::spatial::StopIndex;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Route cap for the network map, enough to show the grid without clutter.
const MAX_MAP_ROUTES: usize = 30;

const TOP_ORIGIN_COUNTIES: usize = 10;

/// Everything the spatial stages need, loaded once.
pub struct AnalysisContext {
    pub stations: Vec<Station>,
    pub feed: GtfsFeed,
    pub stop_index: StopIndex,
    pub zones: Vec<BlockGroupZone>,
    pub demographics: Vec<BlockGroupRecord>,
    pub buffer_meters: f64,
}

impl AnalysisContext {
    #[tracing::instrument(skip_all, fields(gtfs_dir = %gtfs_dir.display()))]
    pub fn load(
        gtfs_dir: &Path,
        stations_file: &Path,
        data: &DataPaths,
        buffer_meters: f64,
    ) -> Result<Self> {
        let stations = load_stations(stations_file)?;
        let feed = GtfsFeed::load(gtfs_dir)?;
        let stop_index = StopIndex::build(&feed.stops);
        let zones = geometry::load_block_groups(&data.block_groups())?;
        let demographics = census::load_demographics(&data.demographics())?;

        Ok(Self {
            stations,
            feed,
            stop_index,
            zones,
            demographics,
            buffer_meters,
        })
    }

    pub fn catchments(&self) -> Vec<CatchmentProfile> {
        catchment::build_catchments(
            &self.stations,
            &self.stop_index,
            &self.zones,
            &self.demographics,
            self.buffer_meters,
            LOW_INCOME_RATIO,
        )
    }

    pub fn connectivity(&self) -> Vec<StationConnectivity> {
        connectivity::all_connectivity(
            &self.feed,
            &self.stop_index,
            &self.stations,
            self.buffer_meters,
        )
    }
}

/// Catchment subcommand: demographics CSV plus the buffers GeoJSON.
pub fn run_catchments(ctx: &AnalysisContext, out_dir: &Path) -> Result<Vec<CatchmentProfile>> {
    let profiles = ctx.catchments();

    let rows: Vec<CatchmentDemographicsRow> = profiles
        .iter()
        .map(|p| CatchmentDemographicsRow {
            station: p.station.clone(),
            stop_count: p.stop_count,
            block_group_count: p.block_group_count,
            total_population: p.total_population,
            median_household_income: p.median_household_income,
            pct_no_vehicle: p.pct_no_vehicle,
            pct_students: p.pct_students,
            unemployment_rate: p.unemployment_rate,
            income_category: p.income_category,
        })
        .collect();
    output::write_csv(&out_dir.join("catchment_demographics.csv"), &rows)?;
    output::write_geojson(
        &out_dir.join("catchments.geojson"),
        &catchment::catchments_to_geojson(&profiles),
    )?;

    Ok(profiles)
}

/// Connectivity subcommand: route counts and peak frequencies per station.
pub fn run_connectivity(
    ctx: &AnalysisContext,
    out_dir: &Path,
) -> Result<Vec<StationConnectivity>> {
    let rows = ctx.connectivity();
    output::write_csv(&out_dir.join("connectivity.csv"), &rows)?;
    Ok(rows)
}

/// Commute subcommand: LODES partition per year and the cross-year delta.
#[tracing::instrument(skip_all, fields(pre_year, post_year))]
pub fn run_commutes(
    data: &DataPaths,
    out_dir: &Path,
    pre_year: i32,
    post_year: i32,
) -> Result<()> {
    let tracts = commute::default_workplace_tracts();

    let mut rows = Vec::new();
    let mut summaries = Vec::new();
    for year in [pre_year, post_year] {
        let records = commute::load_od_records(&data.lodes(year), &tracts)?;
        let summary = commute::summarize(&records, year, &tracts, TOP_ORIGIN_COUNTIES);

        info!(
            year,
            total_jobs = summary.total_jobs,
            commute_in = summary.commute_in,
            pct_commute_in = summary.pct_commute_in,
            "Commute partition computed"
        );
        for county in &summary.top_origin_counties {
            info!(
                year,
                county = %county.county_name,
                jobs = county.jobs,
                pct = county.pct_of_jobs,
                "Origin county"
            );
        }

        rows.push(CommuteFlowRow {
            year: summary.year,
            total_jobs: summary.total_jobs,
            live_local: summary.live_local,
            commute_in: summary.commute_in,
            pct_commute_in: summary.pct_commute_in,
        });
        summaries.push(summary);
    }

    let delta = commute::delta(&summaries[0], &summaries[1], BASELINE_TRANSIT_SHARE);
    info!(
        commuters_lost = delta.commuters_lost,
        pct_lost = delta.pct_lost,
        estimated_transit_riders_lost = delta.estimated_transit_riders_lost,
        "Commuter loss computed"
    );

    output::write_csv(&out_dir.join("commute_flows.csv"), &rows)?;
    output::write_json(&out_dir.join("commute_delta.json"), &delta)?;
    Ok(())
}

/// Joins ridership change, connectivity, and catchment demographics into
/// one record per station, in station-list order. Stations missing
/// baseline ridership are dropped with a warning.
pub fn station_comparisons(
    stations: &[Station],
    changes: &[ridership::RidershipChange],
    connectivity: &[StationConnectivity],
    profiles: &[CatchmentProfile],
) -> Vec<StationComparison> {
    let change_by_station: HashMap<&str, &ridership::RidershipChange> =
        changes.iter().map(|c| (c.station.as_str(), c)).collect();
    let connectivity_by_station: HashMap<&str, &StationConnectivity> =
        connectivity.iter().map(|c| (c.station.as_str(), c)).collect();
    let profile_by_station: HashMap<&str, &CatchmentProfile> =
        profiles.iter().map(|p| (p.station.as_str(), p)).collect();

    let mut comparisons = Vec::new();
    for station in stations {
        let name = station.station.as_str();
        let Some(change) = change_by_station.get(name) else {
            warn!(station = name, "No ridership change for station, dropping from comparison");
            continue;
        };
        let Some(profile) = profile_by_station.get(name) else {
            warn!(station = name, "No catchment profile for station, dropping from comparison");
            continue;
        };
        let (route_count, peak_trips_per_hour) = match connectivity_by_station.get(name) {
            Some(c) => (c.route_count, c.peak_trips_per_hour),
            None => (0, 0.0),
        };

        comparisons.push(StationComparison {
            station: station.station.clone(),
            lat: station.lat,
            lon: station.lon,
            baseline_year: change.baseline_year,
            latest_year: change.latest_year,
            baseline_riders: change.baseline_riders,
            latest_riders: change.latest_riders,
            loss: change.loss,
            pct_loss: change.pct_loss,
            retention: change.retention,
            route_count,
            peak_trips_per_hour,
            median_household_income: profile.median_household_income,
            pct_no_vehicle: profile.pct_no_vehicle,
            income_category: profile.income_category,
        });
    }
    comparisons
}

fn write_comparison_artifacts(out_dir: &Path, comparisons: &[StationComparison]) -> Result<()> {
    output::write_csv(&out_dir.join("station_comparison.csv"), comparisons)?;

    let index = ReportIndex {
        generated_at: chrono::Utc::now(),
        baseline_year: BASELINE_YEAR,
        stations: comparisons
            .iter()
            .map(|c| ReportIndexEntry {
                station: c.station.clone(),
                pct_loss: c.pct_loss,
                retention: c.retention,
                route_count: c.route_count,
                income_category: c.income_category,
            })
            .collect(),
    };
    output::write_json(&out_dir.join("station_comparison.json"), &index)
}

/// Charts subcommand: renders every HTML artifact.
#[tracing::instrument(skip_all)]
pub fn run_charts(ctx: &AnalysisContext, data: &DataPaths, out_dir: &Path) -> Result<()> {
    let profiles = ctx.catchments();
    let connectivity = ctx.connectivity();

    let station_rows = ridership::load_station_ridership(&data.station_ridership())?;
    let changes = ridership::ridership_changes(&station_rows, BASELINE_YEAR);
    let comparisons = station_comparisons(&ctx.stations, &changes, &connectivity, &profiles);

    let performance_rows = performance::load_performance(&data.performance())?;
    let equity_rows = performance::load_equity(&data.temporal_equity())?;
    let service_levels = performance::load_service_levels(&data.service_levels())?;
    let system_rows = ridership::load_system_ridership(&data.system_ridership())?;
    let mode_share = modeshift::load_mode_share(&data.mode_share())?;
    let wfh_rows = modeshift::load_wfh(&data.wfh())?;

    let categories = catchment::income_categories(&profiles);
    let ewt = performance::ewt_by_income(&equity_rows, &categories);
    let systems = ridership::normalize_systems(&system_rows, BASELINE_YEAR);
    let flow = modeshift::wfh_flow(&wfh_rows, BASELINE_YEAR)?;
    let breakdown = modeshift::returner_breakdown(&flow, BASELINE_TRANSIT_SHARE);
    let patterns = modeshift::changed_patterns(breakdown.hybrid);
    let shapes = connectivity::route_shapes_serving(
        &ctx.feed,
        &ctx.stop_index,
        &ctx.stations,
        ctx.buffer_meters,
        MAX_MAP_ROUTES,
    );

    output::write_html(
        &out_dir.join("temporal_service_quality.html"),
        &charts::service_quality::render(&performance_rows, &ewt)?,
    )?;
    output::write_html(
        &out_dir.join("dual_system_degradation.html"),
        &charts::degradation::render(&systems, BASELINE_YEAR)?,
    )?;
    output::write_html(
        &out_dir.join("station_comparison_map.html"),
        &charts::station_map::render(&comparisons, &ctx.zones, &ctx.demographics)?,
    )?;
    output::write_html(
        &out_dir.join("route_network_map.html"),
        &charts::route_network::render(&shapes, &comparisons)?,
    )?;
    output::write_html(
        &out_dir.join("returner_mode_choice.html"),
        &charts::mode_choice::render(&breakdown, &mode_share, &performance_rows, &service_levels)?,
    )?;
    output::write_html(
        &out_dir.join("wfh_retention.html"),
        &charts::wfh::render(&flow, &patterns)?,
    )?;

    write_comparison_artifacts(out_dir, &comparisons)?;
    info!(out_dir = %out_dir.display(), "All charts rendered");
    Ok(())
}

/// The full pipeline: spatial artifacts, commute flows, comparison tables,
/// and charts.
#[tracing::instrument(skip_all, fields(out_dir = %out_dir.display()))]
pub fn run_report(
    ctx: &AnalysisContext,
    data: &DataPaths,
    out_dir: &Path,
    lodes_pre_year: i32,
    lodes_post_year: i32,
) -> Result<()> {
    run_catchments(ctx, out_dir).context("building catchment artifacts")?;
    run_connectivity(ctx, out_dir).context("building connectivity artifacts")?;
    run_commutes(data, out_dir, lodes_pre_year, lodes_post_year)
        .context("building commute artifacts")?;
    run_charts(ctx, data, out_dir).context("rendering charts")?;

    info!(out_dir = %out_dir.display(), "Report complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catchment::IncomeCategory;
    use geo::{LineString, Polygon};

    fn profile(name: &str) -> CatchmentProfile {
        let ring = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
        CatchmentProfile {
            station: name.into(),
            lat: 37.87,
            lon: -122.27,
            buffer: Polygon::new(LineString::from(ring), vec![]),
            stop_count: 4,
            block_group_count: 3,
            total_population: 5000.0,
            median_household_income: Some(63_596.0),
            pct_no_vehicle: Some(33.2),
            pct_students: None,
            unemployment_rate: None,
            income_category: IncomeCategory::LowIncome,
        }
    }

    fn change(name: &str) -> ridership::RidershipChange {
        ridership::RidershipChange {
            station: name.into(),
            baseline_year: 2019,
            latest_year: 2024,
            baseline_riders: 11_566.0,
            latest_riders: 4_170.0,
            loss: 7_396.0,
            pct_loss: 63.9,
            retention: 36.1,
        }
    }

    fn station(name: &str) -> Station {
        Station {
            station: name.into(),
            lat: 37.87,
            lon: -122.27,
        }
    }

    #[test]
    fn test_station_comparisons_joins_all_three() {
        let stations = vec![station("Downtown Berkeley")];
        let connectivity = vec![StationConnectivity {
            station: "Downtown Berkeley".into(),
            route_count: 18,
            peak_trips_per_hour: 103.6,
        }];
        let comparisons = station_comparisons(
            &stations,
            &[change("Downtown Berkeley")],
            &connectivity,
            &[profile("Downtown Berkeley")],
        );

        assert_eq!(comparisons.len(), 1);
        let c = &comparisons[0];
        assert_eq!(c.route_count, 18);
        assert_eq!(c.income_category, IncomeCategory::LowIncome);
        assert_eq!(c.latest_year, 2024);
    }

    #[test]
    fn test_station_without_ridership_is_dropped() {
        let stations = vec![station("Ghost")];
        let comparisons = station_comparisons(&stations, &[], &[], &[profile("Ghost")]);
        assert!(comparisons.is_empty());
    }

    #[test]
    fn test_missing_connectivity_defaults_to_zero() {
        let stations = vec![station("Downtown Berkeley")];
        let comparisons = station_comparisons(
            &stations,
            &[change("Downtown Berkeley")],
            &[],
            &[profile("Downtown Berkeley")],
        );
        assert_eq!(comparisons[0].route_count, 0);
    }
}
