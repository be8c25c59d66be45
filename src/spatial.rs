//! R-tree index over bus stops.
//!
//! Radius queries run in two stages: a fast degree-space envelope filter in
//! the R-tree, then an exact haversine check on the survivors. Euclidean
//! distance in lon/lat degrees is only a prefilter; the haversine pass is
//! what decides membership.

use crate::gtfs::Stop;
use geo::{HaversineDistance, Point};
use rstar::{AABB, PointDistance, RTree, RTreeObject};
use tracing::warn;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone)]
pub struct StopNode {
    pub stop_id: String,
    pub stop_name: Option<String>,
    point: [f64; 2],
}

impl StopNode {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.point[0], self.point[1])
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

pub struct StopIndex {
    tree: RTree<StopNode>,
}

impl StopIndex {
    /// Bulk-loads an index from GTFS stops; stops with invalid coordinates
    /// are dropped with a warning.
    pub fn build(stops: &[Stop]) -> Self {
        let mut nodes = Vec::with_capacity(stops.len());
        for stop in stops {
            if !stop.stop_lat.is_finite()
                || !stop.stop_lon.is_finite()
                || stop.stop_lat.abs() > 90.0
                || stop.stop_lon.abs() > 180.0
            {
                warn!(stop_id = %stop.stop_id, "Dropping stop with invalid coordinates");
                continue;
            }
            nodes.push(StopNode {
                stop_id: stop.stop_id.clone(),
                stop_name: stop.stop_name.clone(),
                point: [stop.stop_lon, stop.stop_lat],
            });
        }
        Self {
            tree: RTree::bulk_load(nodes),
        }
    }

    /// Stops within `radius_meters` of `center` (haversine).
    pub fn within_radius(&self, center: Point<f64>, radius_meters: f64) -> Vec<&StopNode> {
        // Envelope prefilter. Longitude degrees shrink with latitude, so the
        // window widens by 1/cos(lat); the max() guards the poles.
        let dlat = radius_meters / METERS_PER_DEGREE;
        let dlon = dlat / center.y().to_radians().cos().abs().max(0.01);
        let envelope = AABB::from_corners(
            [center.x() - dlon, center.y() - dlat],
            [center.x() + dlon, center.y() + dlat],
        );

        let mut hits: Vec<&StopNode> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .filter(|node| center.haversine_distance(&node.point()) <= radius_meters)
            .collect();
        hits.sort_by(|a, b| a.stop_id.cmp(&b.stop_id));
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            stop_id: id.to_string(),
            stop_name: None,
            stop_lat: lat,
            stop_lon: lon,
        }
    }

    #[test]
    fn test_within_radius_exact_filter() {
        // Downtown Berkeley, plus one stop ~400m away and one ~1.6km away
        let stops = vec![
            stop("near", 37.8703, -122.2725), // ~395 m west
            stop("far", 37.8703, -122.2862),  // ~1.6 km west
            stop("at", 37.8703, -122.2680),
        ];
        let index = StopIndex::build(&stops);
        let center = Point::new(-122.2680, 37.8703);

        let hits = index.within_radius(center, 804.672);
        let ids: Vec<&str> = hits.iter().map(|n| n.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["at", "near"]);
    }

    #[test]
    fn test_corner_of_envelope_is_rejected() {
        // A stop at the envelope corner is ~sqrt(2)*r away and must not match
        let stops = vec![stop("corner", 37.8703 + 0.00722, -122.2680 - 0.00915)];
        let index = StopIndex::build(&stops);
        let center = Point::new(-122.2680, 37.8703);

        assert!(index.within_radius(center, 804.672).is_empty());
    }

    #[test]
    fn test_invalid_coordinates_dropped() {
        let stops = vec![stop("ok", 37.87, -122.27), stop("bad", 137.0, -122.27)];
        let index = StopIndex::build(&stops);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_index() {
        let index = StopIndex::build(&[]);
        assert!(index.is_empty());
        assert!(
            index
                .within_radius(Point::new(-122.27, 37.87), 1000.0)
                .is_empty()
        );
    }
}
