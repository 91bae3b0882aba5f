//! Duplicate detection by category and great-circle distance.
//!
//! A candidate is any existing issue of the same category within
//! `radius_km` of the new submission. The scan is linear over the supplied
//! snapshot; callers may pre-filter the snapshot geographically.

use crate::model::issue::{Category, GeoPoint, Issue};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default search radius (500 m).
pub const DEFAULT_RADIUS_KM: f64 = 0.5;

/// Great-circle distance between two points in kilometres.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    EARTH_RADIUS_KM * 2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// All issues in `existing` with the same category within `radius_km` of `point`.
///
/// Order follows `existing`; there is no cap and no ranking.
#[must_use]
pub fn find_duplicates<'a>(
    point: GeoPoint,
    category: Category,
    radius_km: f64,
    existing: &'a [Issue],
) -> Vec<&'a Issue> {
    let matches: Vec<&Issue> = existing
        .iter()
        .filter(|issue| issue.category == category)
        .filter(|issue| haversine_km(point, issue.location) <= radius_km)
        .collect();

    tracing::debug!(
        category = %category,
        radius_km,
        scanned = existing.len(),
        matched = matches.len(),
        "duplicate scan finished"
    );
    matches
}
