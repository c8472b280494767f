//! Great-circle distance and coordinate rounding.

use crate::domain::TagValue;

const EARTH_RADIUS_KM: f64 = 6371.0088;
const MAX_PRECISION: i32 = 12;

/// Haversine distance in kilometres between two `(lat, lng)` points.
pub fn distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Round to the fewest decimals that stay within `tolerance_m` metres of the
/// original point. Returns the rounded point and the decimals used.
pub fn round_coordinates(lat: f64, lng: f64, tolerance_m: f64) -> ((f64, f64), i32) {
    let mut rounded = (lat, lng);
    for precision in 1..=MAX_PRECISION {
        rounded = (round_to(lat, precision), round_to(lng, precision));
        let err_m = distance_km((lat, lng), rounded) * 1000.0;
        if err_m < tolerance_m {
            if err_m > 0.0 {
                tracing::debug!(
                    "round location: ({lat}, {lng}) -> ({}, {}) with precision {precision} (err: {err_m}m)",
                    rounded.0,
                    rounded.1
                );
            }
            return (rounded, precision);
        }
    }
    ((lat, lng), MAX_PRECISION)
}

fn round_to(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (value * factor).round() / factor
}

/// Parse a `"lat lng"` / `"lat, lng[, alt]"` pair from a tag value.
pub fn parse_pair(value: &TagValue) -> Option<(f64, f64)> {
    let numbers: Vec<f64> = match value {
        TagValue::List(items) => items.iter().filter_map(|s| s.trim().parse().ok()).collect(),
        TagValue::Text(s) => s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(|t| t.parse().ok())
            .collect::<Option<Vec<f64>>>()?,
        _ => return None,
    };
    match numbers.as_slice() {
        [lat, lng, ..] => Some((*lat, *lng)),
        _ => None,
    }
}
