use crate::geo::haversine_km;
use crate::models::driver::{Coordinate, Driver};

/// Radii tried in order, widest last.
pub const SEARCH_RADII_KM: [f64; 6] = [5.0, 10.0, 15.0, 20.0, 25.0, 50.0];

/// Returns every driver inside the smallest radius tier that holds at least
/// one driver, or an empty vec when nobody is within the widest tier.
pub fn nearby_candidates(origin: &Coordinate, pool: &[Driver]) -> Vec<Driver> {
    for radius_km in SEARCH_RADII_KM {
        let within: Vec<Driver> = pool
            .iter()
            .filter(|driver| haversine_km(origin, &driver.location) <= radius_km)
            .cloned()
            .collect();

        if !within.is_empty() {
            return within;
        }
    }

    Vec::new()
}
