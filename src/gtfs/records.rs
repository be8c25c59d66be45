//! Typed rows for the GTFS tables the analysis consumes.
//!
//! Only the columns we actually use are declared; serde ignores the rest.

use serde::Deserialize;

/// Row of `routes.txt`.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_type: Option<u16>,
}

impl Route {
    /// Display name, preferring the short name ("6", "51B").
    pub fn display_name(&self) -> &str {
        self.route_short_name
            .as_deref()
            .or(self.route_long_name.as_deref())
            .unwrap_or(&self.route_id)
    }
}

/// Row of `trips.txt`.
#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub trip_id: String,
    pub route_id: String,
    #[serde(default)]
    pub shape_id: Option<String>,
}

/// Row of `stops.txt`.
#[derive(Debug, Clone, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

/// Row of `stop_times.txt`. Departure stays raw; non-timepoint rows leave it
/// empty and the clock format needs its own parser (hours may exceed 23).
#[derive(Debug, Clone, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    #[serde(default)]
    pub departure_time: Option<String>,
    pub stop_sequence: u32,
}

/// Row of `shapes.txt`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShapePoint {
    pub shape_id: String,
    pub shape_pt_lat: f64,
    pub shape_pt_lon: f64,
    pub shape_pt_sequence: u32,
}
