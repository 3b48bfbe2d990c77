//! Great-circle distance (haversine)

use crate::region::GeoLocation;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine great-circle distance between two lat/lon pairs, in kilometers
///
/// Inputs are degrees. The result is non-negative, symmetric, and exactly
/// zero for identical coordinates. Coordinates are assumed to be validated
/// upstream (see [`GeoLocation::is_valid`]).
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // Rounding can push `a` a hair above 1.0 for near-antipodal points
    let a = a.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

impl GeoLocation {
    /// Distance to another location in kilometers
    pub fn distance_to(&self, other: &GeoLocation) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}
