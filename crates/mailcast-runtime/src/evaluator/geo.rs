//! Great-circle distance

use mailcast_core::{GeoPoint, GeoRadius};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Members without coordinates are never within any radius
pub(crate) fn within(point: Option<GeoPoint>, area: &GeoRadius) -> bool {
    match point {
        Some(point) => haversine_km(point, GeoPoint::new(area.lat, area.lng)) <= area.radius_km,
        None => false,
    }
}
