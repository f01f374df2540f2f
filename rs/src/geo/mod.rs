//! Geo primitives: bearing quantization, mercator-projected earth distance,
//! point-on-segment interpolation.

use crate::core::types::{Junction, LatLon};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;
/// Degrees per quantized bearing bucket: `360 / 256`.
pub const DEGREES_PER_BUCKET: f64 = 360.0 / 256.0;

/// Mercator-project a lat/lon into a `Junction` (flat x/y in meters).
pub fn project(point: LatLon) -> Junction {
    let x = point.lon.to_radians() * EARTH_RADIUS_METERS;
    let y = (point.lat.to_radians() / 2.0 + std::f64::consts::FRAC_PI_4)
        .tan()
        .ln()
        * EARTH_RADIUS_METERS;
    Junction::new(x, y)
}

fn unproject(j: Junction) -> LatLon {
    let lon = (j.merc_x / EARTH_RADIUS_METERS).to_degrees();
    let lat = (2.0 * (j.merc_y / EARTH_RADIUS_METERS).exp().atan() - std::f64::consts::FRAC_PI_2)
        .to_degrees();
    LatLon::new(lat, lon)
}

/// Great-circle distance between two mercator-projected points, in meters.
pub fn distance_on_earth(a: Junction, b: Junction) -> f64 {
    let la = unproject(a);
    let lb = unproject(b);
    haversine_distance_meters(la, lb)
}

pub fn haversine_distance_meters(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Compass bearing from `a` to `b` in degrees, `0` = north, clockwise,
/// clamped to `[0, 360]`.
pub fn bearing_degrees(a: Junction, b: Junction) -> f64 {
    let la = unproject(a);
    let lb = unproject(b);

    let lat1 = la.lat.to_radians();
    let lat2 = lb.lat.to_radians();
    let dlon = (lb.lon - la.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let mut deg = y.atan2(x).to_degrees();
    if deg < 0.0 {
        deg += 360.0;
    }
    deg.clamp(0.0, 360.0)
}

/// `bearing(a, b)` quantized to a `[0, 255]` bucket.
pub fn bearing(a: Junction, b: Junction) -> u8 {
    let deg = bearing_degrees(a, b);
    let bucket = (deg / DEGREES_PER_BUCKET) as i32;
    bucket.clamp(0, 255) as u8
}

/// Absolute difference between two quantized bearings, in bucket units,
/// accounting for wraparound (the shorter arc around the circle).
pub fn bearing_bucket_diff(expected: u8, actual: u8) -> f64 {
    let raw = (expected as i32 - actual as i32).abs() as f64;
    raw.min(256.0 - raw)
}

/// The point on segment `a`->`b` at distance `d` meters from `a`.
/// Extrapolates past `b` if `d` exceeds the segment length.
pub fn point_at_segment(a: Junction, b: Junction, d: f64) -> Junction {
    let len = distance_on_earth(a, b);
    if len < 1e-9 {
        return a;
    }
    let t = d / len;
    Junction::new(
        a.merc_x + t * (b.merc_x - a.merc_x),
        a.merc_y + t * (b.merc_y - a.merc_y),
    )
}
