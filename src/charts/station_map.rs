//! Station comparison map: transit-dependency choropleth with station
//! markers sized by ridership loss and colored by income category.

use super::figure::{Figure, base_layout};
use super::income_color;
use crate::analyzers::types::StationComparison;
use crate::census::BlockGroupRecord;
use crate::geometry::BlockGroupZone;
use anyhow::Result;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::json;
use std::collections::HashMap;

/// Marker diameter is absolute loss scaled down to pixels.
const LOSS_PER_PIXEL: f64 = 100.0;

pub fn figure(
    stations: &[StationComparison],
    zones: &[BlockGroupZone],
    demographics: &[BlockGroupRecord],
) -> Figure {
    let by_geoid: HashMap<&str, &BlockGroupRecord> = demographics
        .iter()
        .map(|d| (d.geoid.as_str(), d))
        .collect();

    // Choropleth inputs: one feature + one z value per block group that has
    // both a footprint and a dependency rate
    let mut features = Vec::new();
    let mut locations = Vec::new();
    let mut z = Vec::new();
    let mut customdata = Vec::new();
    for zone in zones {
        let Some(record) = by_geoid.get(zone.geoid.as_str()) else {
            continue;
        };
        let Some(pct_no_vehicle) = record.pct_no_vehicle() else {
            continue;
        };

        let mut properties = JsonObject::new();
        properties.insert("geoid".into(), json!(zone.geoid));
        features.push(Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&zone.geometry))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
        locations.push(zone.geoid.clone());
        z.push(pct_no_vehicle);
        customdata.push(vec![record.median_household_income.unwrap_or(0.0)]);
    }
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let center_lat = stations.iter().map(|s| s.lat).sum::<f64>() / stations.len().max(1) as f64;
    let center_lon = stations.iter().map(|s| s.lon).sum::<f64>() / stations.len().max(1) as f64;

    let mut layout = base_layout(
        "Station Ridership Loss and Transit Dependency",
        "Block Group Level | ACS 5-Year Estimates",
        750,
    );
    layout["margin"] = json!({"t": 110, "b": 40, "l": 40, "r": 140});
    layout["mapbox"] = json!({
        "style": "carto-positron",
        "center": {"lat": center_lat, "lon": center_lon},
        "zoom": 12.3
    });
    layout["legend"]["title"] = json!({"text": "<b>Stations</b>", "font": {"size": 12}});
    layout["legend"]["x"] = json!(0.02);
    layout["legend"]["y"] = json!(0.98);

    let mut fig = Figure::new(layout);

    fig.add_trace(json!({
        "type": "choroplethmapbox",
        "geojson": serde_json::to_value(&collection).unwrap_or_default(),
        "locations": locations,
        "featureidkey": "properties.geoid",
        "z": z,
        "colorscale": "YlOrRd",
        "zmin": 0,
        "zmax": 50,
        "marker": {"opacity": 0.6, "line": {"width": 0.5, "color": "white"}},
        "colorbar": {
            "title": {"text": "% Households<br>Without Vehicle", "font": {"size": 13}},
            "x": 1.02,
            "len": 0.7,
            "thickness": 18,
            "ticksuffix": "%",
            "tickfont": {"size": 11}
        },
        "customdata": customdata,
        "hovertemplate": "<b>Block Group</b><br>Transit Dependency: %{z:.1f}%<br>Median Income: $%{customdata[0]:,.0f}<br><extra></extra>",
        "name": "Transit Dependency",
        "showlegend": false
    }));

    for station in stations {
        fig.add_trace(json!({
            "type": "scattermapbox",
            "lon": [station.lon],
            "lat": [station.lat],
            "mode": "markers+text",
            "marker": {
                "size": (station.loss / LOSS_PER_PIXEL).max(8.0),
                "color": income_color(station.income_category),
                "opacity": 0.95
            },
            "text": [station.station],
            "textposition": "top center",
            "textfont": {"size": 13, "color": "black"},
            "hovertemplate": hover_text(station),
            "name": station.station,
            "showlegend": true
        }));
    }

    fig
}

fn hover_text(station: &StationComparison) -> String {
    let income = station
        .median_household_income
        .map(|v| format!("${v:.0}"))
        .unwrap_or_else(|| "n/a".to_string());
    let no_vehicle = station
        .pct_no_vehicle
        .map(|v| format!("{v:.1}%"))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "<b>{}</b><br><br>\
         <b>RIDERSHIP ({}→{}):</b><br>  {}: {:.0} daily<br>  {}: {:.0} daily<br>  \
         <b>Lost: {:.0} ({:.1}%)</b><br>  Retained: {:.1}%<br><br>\
         <b>BUS ACCESS:</b><br>  {} routes<br>  {:.1} trips/hr (peak)<br><br>\
         <b>DEMOGRAPHICS:</b><br>  Median Income: {}<br>  No Vehicle: {}<br>  {}<extra></extra>",
        station.station,
        station.baseline_year,
        station.latest_year,
        station.baseline_year,
        station.baseline_riders,
        station.latest_year,
        station.latest_riders,
        station.loss,
        station.pct_loss,
        station.retention,
        station.route_count,
        station.peak_trips_per_hour,
        income,
        no_vehicle,
        station.income_category,
    )
}

pub fn render(
    stations: &[StationComparison],
    zones: &[BlockGroupZone],
    demographics: &[BlockGroupRecord],
) -> Result<String> {
    let fig = figure(stations, zones, demographics);
    let caption = caption(stations);
    super::template::render_page("Station Comparison Map", &caption, &fig)
}

fn caption(stations: &[StationComparison]) -> String {
    let losses: Vec<String> = stations
        .iter()
        .map(|s| format!("{} lost {:.1}% of its riders", s.station, s.pct_loss))
        .collect();
    format!(
        "Background color shows households without vehicles by block group; darker red means \
         more transit dependency. Marker size is absolute ridership loss, marker color is the \
         catchment income category. {}. Better bus access did not protect against losses: both \
         the rail and bus systems degraded at once, so more routes provided no benefit.",
        losses.join(", ")
    )
}
