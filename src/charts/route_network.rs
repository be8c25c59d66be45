//! Bus route network map: every route serving the station catchments, with
//! station markers sized by route count.

use super::figure::{Figure, base_layout};
use super::{ROUTE_ORANGE, income_color};
use crate::analyzers::types::StationComparison;
use crate::connectivity::RouteShape;
use anyhow::Result;
use serde_json::json;

/// Marker diameter per connecting route.
const PIXELS_PER_ROUTE: f64 = 3.0;

pub fn figure(shapes: &[RouteShape], stations: &[StationComparison]) -> Figure {
    let center_lat = stations.iter().map(|s| s.lat).sum::<f64>() / stations.len().max(1) as f64;
    let center_lon = stations.iter().map(|s| s.lon).sum::<f64>() / stations.len().max(1) as f64;

    let mut layout = base_layout(
        "Bus Route Network Serving the Study Stations",
        "Station Level | GTFS Schedule Data",
        700,
    );
    layout["margin"] = json!({"t": 110, "b": 40, "l": 40, "r": 40});
    layout["mapbox"] = json!({
        "style": "carto-darkmatter",
        "center": {"lat": center_lat, "lon": center_lon},
        "zoom": 13
    });
    layout["legend"]["x"] = json!(0.02);
    layout["legend"]["y"] = json!(0.98);

    let mut fig = Figure::new(layout);

    for shape in shapes {
        let lon: Vec<f64> = shape.points.iter().map(|p| p.0).collect();
        let lat: Vec<f64> = shape.points.iter().map(|p| p.1).collect();
        fig.add_trace(json!({
            "type": "scattermapbox",
            "lon": lon,
            "lat": lat,
            "mode": "lines",
            "line": {"width": 2, "color": ROUTE_ORANGE},
            "name": format!("Route {}", shape.display_name),
            "hovertemplate": format!(
                "<b>Route {}</b><br>{}<extra></extra>",
                shape.display_name, shape.long_name
            ),
            "showlegend": true
        }));
    }

    for station in stations {
        fig.add_trace(json!({
            "type": "scattermapbox",
            "lon": [station.lon],
            "lat": [station.lat],
            "mode": "markers+text",
            "marker": {
                "size": (station.route_count as f64 * PIXELS_PER_ROUTE).max(6.0),
                "color": income_color(station.income_category),
                "opacity": 0.9
            },
            "text": [station.station],
            "textposition": "top center",
            "textfont": {"size": 11, "color": "white"},
            "hovertemplate": format!(
                "<b>{}</b><br>Bus Routes: {}<br>Peak Frequency: {:.1} trips/hr<br>Income Category: {}<br><extra></extra>",
                station.station,
                station.route_count,
                station.peak_trips_per_hour,
                station.income_category
            ),
            "name": station.station,
            "showlegend": true
        }));
    }

    fig
}

pub fn render(shapes: &[RouteShape], stations: &[StationComparison]) -> Result<String> {
    let fig = figure(shapes, stations);
    let caption = caption(shapes, stations);
    super::template::render_page("Bus Route Network", &caption, &fig)
}

fn caption(shapes: &[RouteShape], stations: &[StationComparison]) -> String {
    let access: Vec<String> = stations
        .iter()
        .map(|s| {
            format!(
                "{} has {} routes at {:.0} trips per hour during the peak",
                s.station, s.route_count, s.peak_trips_per_hour
            )
        })
        .collect();
    format!(
        "Orange lines show the {} bus routes serving the study stations; larger circles mean \
         more connecting routes. {}. This bus access did not protect ridership: both systems \
         degraded at the same time, so riders with more alternatives still left.",
        shapes.len(),
        access.join("; ")
    )
}
