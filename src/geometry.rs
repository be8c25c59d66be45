//! Geometric inputs: block-group polygons and station catchment buffers.

use anyhow::{Context, Result};
use geo::{Coord, HaversineDestination, LineString, MultiPolygon, Point, Polygon};
use geojson::{FeatureCollection, GeoJson};
use std::path::Path;
use tracing::{debug, warn};

/// Ring resolution for catchment buffer circles.
const BUFFER_SEGMENTS: usize = 64;

/// A census block group with its polygon footprint.
#[derive(Debug, Clone)]
pub struct BlockGroupZone {
    pub geoid: String,
    pub geometry: MultiPolygon<f64>,
}

/// Loads block-group footprints from a GeoJSON `FeatureCollection`.
///
/// Features need a `geoid` (or `GEOID`) property and a Polygon or
/// MultiPolygon geometry; anything else is skipped with a warning.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_block_groups(path: &Path) -> Result<Vec<BlockGroupZone>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading block groups file {}", path.display()))?;
    let geojson: GeoJson = raw
        .parse()
        .with_context(|| format!("parsing GeoJSON in {}", path.display()))?;
    let collection = FeatureCollection::try_from(geojson)
        .context("block groups file is not a FeatureCollection")?;

    let mut zones = Vec::new();
    for feature in collection.features {
        let geoid = feature
            .property("geoid")
            .or_else(|| feature.property("GEOID"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);

        let Some(geoid) = geoid else {
            warn!("Skipping block group feature without a geoid property");
            continue;
        };

        let Some(geometry) = feature.geometry else {
            warn!(geoid, "Skipping block group feature without geometry");
            continue;
        };

        let geometry = match geo::Geometry::<f64>::try_from(geometry.value) {
            Ok(geo::Geometry::Polygon(p)) => MultiPolygon(vec![p]),
            Ok(geo::Geometry::MultiPolygon(mp)) => mp,
            Ok(_) => {
                warn!(geoid, "Skipping block group with non-polygon geometry");
                continue;
            }
            Err(e) => {
                warn!(geoid, error = %e, "Skipping block group with invalid geometry");
                continue;
            }
        };

        zones.push(BlockGroupZone { geoid, geometry });
    }

    debug!(count = zones.len(), "Block group footprints loaded");
    Ok(zones)
}

/// Builds the walkable catchment buffer around a station: a geodesic circle
/// approximated by [`BUFFER_SEGMENTS`] haversine-projected vertices.
pub fn buffer_polygon(center: Point<f64>, radius_meters: f64) -> Polygon<f64> {
    let mut ring: Vec<Coord<f64>> = (0..BUFFER_SEGMENTS)
        .map(|i| {
            let bearing = 360.0 * i as f64 / BUFFER_SEGMENTS as f64;
            let vertex = center.haversine_destination(bearing, radius_meters);
            Coord {
                x: vertex.x(),
                y: vertex.y(),
            }
        })
        .collect();
    // LineString::close() would also do this; being explicit keeps the ring
    // valid even if the constructor changes.
    ring.push(ring[0]);

    Polygon::new(LineString::from(ring), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, HaversineDistance};

    #[test]
    fn test_buffer_polygon_radius() {
        let center = Point::new(-122.2680, 37.8703);
        let radius = 804.672;
        let buffer = buffer_polygon(center, radius);

        // Every vertex sits on the requested radius, within 1%
        for coord in buffer.exterior().coords() {
            let d = center.haversine_distance(&Point::new(coord.x, coord.y));
            assert!((d - radius).abs() / radius < 0.01, "vertex at {d} m");
        }
    }

    #[test]
    fn test_buffer_polygon_closed_and_contains_center() {
        let center = Point::new(-122.2680, 37.8703);
        let buffer = buffer_polygon(center, 500.0);

        let exterior = buffer.exterior();
        assert_eq!(exterior.0.first(), exterior.0.last());
        assert!(buffer.contains(&center));
    }

    #[test]
    fn test_load_block_groups_skips_bad_features() {
        let path = std::env::temp_dir().join("ridership_atlas_bg.geojson");
        let content = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"geoid": "060014220001"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-122.27,37.87],[-122.26,37.87],[-122.26,37.88],[-122.27,37.88],[-122.27,37.87]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[-122.27,37.87],[-122.26,37.87],[-122.26,37.88],[-122.27,37.87]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {"geoid": "060014220002"},
                    "geometry": {"type": "Point", "coordinates": [-122.27, 37.87]}
                }
            ]
        }"#;
        std::fs::write(&path, content).unwrap();

        let zones = load_block_groups(&path).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].geoid, "060014220001");

        std::fs::remove_file(path).unwrap();
    }
}
