//! Great-circle helpers over WGS84 coordinates.
//!
//! All functions are pure. Distances are in kilometers, bearings in degrees
//! clockwise from north in `[0, 360)`.

use geo::{HaversineBearing, HaversineDistance, Point};

use crate::models::Coordinate;

fn to_point(c: Coordinate) -> Point<f64> {
    Point::new(c.lon, c.lat)
}

/// Great-circle distance between two coordinates.
pub fn haversine_distance_km(a: Coordinate, b: Coordinate) -> f64 {
    to_point(a).haversine_distance(&to_point(b)) / 1000.0
}

/// Distance from `p` to the segment `seg_start`-`seg_end`.
///
/// The segment is projected into a local equirectangular frame centred on `p`,
/// the projection parameter is clamped to the segment, and the distance to the
/// resulting closest point is measured on the sphere. A degenerate segment
/// reduces to the point distance.
pub fn distance_point_to_segment_km(p: Coordinate, seg_start: Coordinate, seg_end: Coordinate) -> f64 {
    if seg_start == seg_end {
        return haversine_distance_km(p, seg_start);
    }

    let scale = p.lat.to_radians().cos();
    let ax = wrap_longitude(seg_start.lon - p.lon) * scale;
    let ay = seg_start.lat - p.lat;
    let bx = wrap_longitude(seg_end.lon - p.lon) * scale;
    let by = seg_end.lat - p.lat;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return haversine_distance_km(p, seg_start);
    }

    // p sits at the origin of the local frame.
    let t = (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0);
    let closest = Coordinate {
        lat: seg_start.lat + t * (seg_end.lat - seg_start.lat),
        lon: wrap_longitude(seg_start.lon + t * wrap_longitude(seg_end.lon - seg_start.lon)),
    };
    haversine_distance_km(p, closest)
}

/// Initial bearing of the great circle from `from` to `to`.
pub fn bearing_degrees(from: Coordinate, to: Coordinate) -> f64 {
    let bearing = to_point(from).haversine_bearing(to_point(to));
    let normalized = bearing.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

fn wrap_longitude(delta: f64) -> f64 {
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}
