//! End-to-end pipeline tests over the fixture datasets: a small synthetic
//! GTFS feed, block-group demographics and footprints, and the transcribed
//! ridership/performance series.

use approx::assert_relative_eq;
use flate2::{Compression, write::GzEncoder};
use ridership_atlas::analyzers::report::{
    AnalysisContext, run_catchments, run_charts, run_commutes, run_connectivity,
};
use ridership_atlas::catchment::IncomeCategory;
use ridership_atlas::config::DataPaths;
use std::io::Write;
use std::path::{Path, PathBuf};

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_context() -> AnalysisContext {
    let fixtures = fixtures();
    let data = DataPaths::new(fixtures.join("processed"));
    AnalysisContext::load(
        &fixtures.join("gtfs"),
        &fixtures.join("stations.csv"),
        &data,
        804.672,
    )
    .expect("fixture context loads")
}

fn fresh_out_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_catchment_pipeline() {
    let ctx = load_context();
    let out_dir = fresh_out_dir("ridership_atlas_it_catchments");

    let profiles = run_catchments(&ctx, &out_dir).unwrap();
    assert_eq!(profiles.len(), 3);

    let downtown = &profiles[0];
    assert_eq!(downtown.station, "Downtown Berkeley");
    assert_eq!(downtown.stop_count, 2);
    assert_eq!(downtown.block_group_count, 2);
    assert_relative_eq!(downtown.total_population, 4000.0);
    // (63596 * 3000 + 55000 * 1000) / 4000
    assert_relative_eq!(
        downtown.median_household_income.unwrap(),
        61_447.0,
        epsilon = 0.1
    );
    assert_relative_eq!(downtown.pct_no_vehicle.unwrap(), 32.5, epsilon = 0.01);
    assert_eq!(downtown.income_category, IncomeCategory::LowIncome);

    let north = &profiles[1];
    assert_eq!(north.station, "North Berkeley");
    assert_eq!(north.block_group_count, 1);
    assert_eq!(north.income_category, IncomeCategory::NonLowIncome);

    let ashby = &profiles[2];
    assert_eq!(ashby.stop_count, 1);
    assert_relative_eq!(ashby.median_household_income.unwrap(), 103_532.0);

    assert!(out_dir.join("catchment_demographics.csv").exists());
    let geojson = std::fs::read_to_string(out_dir.join("catchments.geojson")).unwrap();
    assert_eq!(geojson.matches("\"Feature\"").count(), 3);

    std::fs::remove_dir_all(&out_dir).unwrap();
}

#[test]
fn test_connectivity_pipeline() {
    let ctx = load_context();
    let out_dir = fresh_out_dir("ridership_atlas_it_connectivity");

    let rows = run_connectivity(&ctx, &out_dir).unwrap();
    assert_eq!(rows.len(), 3);

    // Downtown: routes r6 + r18, peak trips t6a/t6b/t18a over a 2h window
    assert_eq!(rows[0].route_count, 2);
    assert_relative_eq!(rows[0].peak_trips_per_hour, 1.5);

    // North Berkeley: only r18, one peak departure
    assert_eq!(rows[1].route_count, 1);
    assert_relative_eq!(rows[1].peak_trips_per_hour, 0.5);

    // Ashby: r79; the 26:10:00 trip parses but is off-peak
    assert_eq!(rows[2].route_count, 1);
    assert_relative_eq!(rows[2].peak_trips_per_hour, 0.5);

    let csv = std::fs::read_to_string(out_dir.join("connectivity.csv")).unwrap();
    assert_eq!(csv.lines().count(), 4); // header + 3 stations

    std::fs::remove_dir_all(&out_dir).unwrap();
}

#[test]
fn test_charts_pipeline() {
    let ctx = load_context();
    let data = DataPaths::new(fixtures().join("processed"));
    let out_dir = fresh_out_dir("ridership_atlas_it_charts");

    run_charts(&ctx, &data, &out_dir).unwrap();

    for artifact in [
        "temporal_service_quality.html",
        "dual_system_degradation.html",
        "station_comparison_map.html",
        "route_network_map.html",
        "returner_mode_choice.html",
        "wfh_retention.html",
    ] {
        let html = std::fs::read_to_string(out_dir.join(artifact)).unwrap();
        assert!(html.contains("Plotly.newPlot"), "{artifact} missing plot call");
        assert!(html.contains("cdn.plot.ly"), "{artifact} missing plotly script");
    }

    // The degradation chart carries its animation frames
    let degradation =
        std::fs::read_to_string(out_dir.join("dual_system_degradation.html")).unwrap();
    assert!(degradation.contains("\"frames\""));

    // Comparison artifacts ride along with the charts
    let comparison = std::fs::read_to_string(out_dir.join("station_comparison.csv")).unwrap();
    assert_eq!(comparison.lines().count(), 4);
    assert!(comparison.contains("Downtown Berkeley"));

    let index: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("station_comparison.json")).unwrap())
            .unwrap();
    assert_eq!(index["baseline_year"], 2019);
    assert_eq!(index["stations"].as_array().unwrap().len(), 3);
    assert_eq!(index["stations"][0]["income_category"], "Low-Income Area");

    std::fs::remove_dir_all(&out_dir).unwrap();
}

#[test]
fn test_commutes_pipeline() {
    // LODES inputs are gzipped; build them on the fly in a scratch data dir
    let data_dir = fresh_out_dir("ridership_atlas_it_lodes_data");
    write_lodes(
        &data_dir.join("lodes_od_2019.csv.gz"),
        &[
            ("060014222001001", "060014223002002", 4_000), // lives local
            ("060014222001001", "060750101001001", 5_000), // SF commuter
            ("060014223001001", "060133200001001", 3_000), // Contra Costa
            ("069999999001001", "060750101001001", 9_999), // outside study area
        ],
    );
    write_lodes(
        &data_dir.join("lodes_od_2021.csv.gz"),
        &[
            ("060014222001001", "060014223002002", 3_500),
            ("060014222001001", "060750101001001", 2_500),
            ("060014223001001", "060133200001001", 1_500),
        ],
    );

    let out_dir = fresh_out_dir("ridership_atlas_it_lodes_out");
    let data = DataPaths::new(&data_dir);
    run_commutes(&data, &out_dir, 2019, 2021).unwrap();

    let flows = std::fs::read_to_string(out_dir.join("commute_flows.csv")).unwrap();
    let lines: Vec<&str> = flows.lines().collect();
    assert_eq!(lines.len(), 3);
    // 2019: 12000 total, 4000 local, 8000 in
    assert!(lines[1].contains("12000"), "{flows}");
    assert!(lines[1].contains("8000"));

    let delta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("commute_delta.json")).unwrap())
            .unwrap();
    // 8000 - 4000 commuters lost, 13% of them assumed transit riders
    assert_eq!(delta["commuters_lost"], 4000);
    assert_eq!(delta["estimated_transit_riders_lost"], 520);

    std::fs::remove_dir_all(&data_dir).unwrap();
    std::fs::remove_dir_all(&out_dir).unwrap();
}

fn write_lodes(path: &Path, rows: &[(&str, &str, u64)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut enc = GzEncoder::new(file, Compression::default());
    enc.write_all(b"w_geocode,h_geocode,S000\n").unwrap();
    for (w, h, jobs) in rows {
        writeln!(enc, "{w},{h},{jobs}").unwrap();
    }
    enc.finish().unwrap();
}
