//! Bus connectivity around each station.
//!
//! Walks the GTFS joins the schedule implies: catchment stops → stop_times →
//! trips → routes. Frequency counts a trip once even when it touches several
//! catchment stops.

use crate::config::{PEAK_WINDOW_SECONDS, Station};
use crate::gtfs::{GtfsFeed, parse_clock};
use crate::spatial::StopIndex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Per-station bus connectivity summary.
#[derive(Debug, Clone, Serialize)]
pub struct StationConnectivity {
    pub station: String,
    /// Distinct bus routes with a scheduled departure at a catchment stop.
    pub route_count: usize,
    /// Distinct trips departing a catchment stop during the morning peak,
    /// per hour of the window.
    pub peak_trips_per_hour: f64,
}

/// One representative polyline per route, for the network map.
#[derive(Debug, Clone)]
pub struct RouteShape {
    pub route_id: String,
    pub display_name: String,
    pub long_name: String,
    /// `(lon, lat)` vertices in shape order.
    pub points: Vec<(f64, f64)>,
}

/// Computes connectivity for one station catchment.
#[tracing::instrument(skip(feed, stop_index), fields(station = %station.station))]
pub fn station_connectivity(
    feed: &GtfsFeed,
    stop_index: &StopIndex,
    station: &Station,
    radius_meters: f64,
) -> StationConnectivity {
    let catchment_stops: HashSet<&str> = stop_index
        .within_radius(station.point(), radius_meters)
        .iter()
        .map(|n| n.stop_id.as_str())
        .collect();

    let trips_by_id = feed.trips_by_id();
    let (peak_start, peak_end) = PEAK_WINDOW_SECONDS;

    let mut routes: HashSet<&str> = HashSet::new();
    let mut peak_trips: HashSet<&str> = HashSet::new();

    for stop_time in &feed.stop_times {
        if !catchment_stops.contains(stop_time.stop_id.as_str()) {
            continue;
        }
        let Some(trip) = trips_by_id.get(stop_time.trip_id.as_str()) else {
            warn!(trip_id = %stop_time.trip_id, "stop_time references unknown trip");
            continue;
        };
        routes.insert(trip.route_id.as_str());

        let Some(raw) = stop_time.departure_time.as_deref() else {
            continue; // non-timepoint row
        };
        match parse_clock(raw) {
            Ok(seconds) if (peak_start..peak_end).contains(&seconds) => {
                peak_trips.insert(trip.trip_id.as_str());
            }
            Ok(_) => {}
            Err(e) => warn!(trip_id = %stop_time.trip_id, error = %e, "Bad departure time"),
        }
    }

    let window_hours = f64::from(peak_end - peak_start) / 3600.0;
    let connectivity = StationConnectivity {
        station: station.station.clone(),
        route_count: routes.len(),
        peak_trips_per_hour: peak_trips.len() as f64 / window_hours,
    };

    info!(
        routes = connectivity.route_count,
        peak_trips_per_hour = connectivity.peak_trips_per_hour,
        catchment_stops = catchment_stops.len(),
        "Station connectivity computed"
    );
    connectivity
}

/// Connectivity for every station.
pub fn all_connectivity(
    feed: &GtfsFeed,
    stop_index: &StopIndex,
    stations: &[Station],
    radius_meters: f64,
) -> Vec<StationConnectivity> {
    stations
        .iter()
        .map(|s| station_connectivity(feed, stop_index, s, radius_meters))
        .collect()
}

/// One polyline per route serving any station catchment, capped at
/// `max_routes` to keep the map legible. Routes are ordered by id for
/// deterministic output; the first shape of each route stands in for the
/// whole route, and shapes shorter than 2 points are dropped.
pub fn route_shapes_serving(
    feed: &GtfsFeed,
    stop_index: &StopIndex,
    stations: &[Station],
    radius_meters: f64,
    max_routes: usize,
) -> Vec<RouteShape> {
    let mut catchment_stops: HashSet<String> = HashSet::new();
    for station in stations {
        for node in stop_index.within_radius(station.point(), radius_meters) {
            catchment_stops.insert(node.stop_id.clone());
        }
    }

    let trips_by_id = feed.trips_by_id();
    let routes_by_id = feed.routes_by_id();

    // route_id -> first shape_id seen, BTreeMap for deterministic order
    let mut shape_for_route: BTreeMap<&str, &str> = BTreeMap::new();
    for stop_time in &feed.stop_times {
        if !catchment_stops.contains(stop_time.stop_id.as_str()) {
            continue;
        }
        let Some(trip) = trips_by_id.get(stop_time.trip_id.as_str()) else {
            continue;
        };
        let Some(shape_id) = trip.shape_id.as_deref() else {
            continue;
        };
        shape_for_route.entry(trip.route_id.as_str()).or_insert(shape_id);
    }

    let mut shapes = Vec::new();
    for (route_id, shape_id) in shape_for_route.into_iter().take(max_routes) {
        let points: Vec<(f64, f64)> = feed
            .shape_points(shape_id)
            .iter()
            .map(|p| (p.shape_pt_lon, p.shape_pt_lat))
            .collect();
        if points.len() < 2 {
            debug!(route_id, shape_id, "Dropping degenerate route shape");
            continue;
        }

        let (display_name, long_name) = match routes_by_id.get(route_id) {
            Some(route) => (
                route.display_name().to_string(),
                route.route_long_name.clone().unwrap_or_default(),
            ),
            None => (route_id.to_string(), String::new()),
        };

        shapes.push(RouteShape {
            route_id: route_id.to_string(),
            display_name,
            long_name,
            points,
        });
    }

    info!(routes = shapes.len(), "Route shapes collected for network map");
    shapes
}
