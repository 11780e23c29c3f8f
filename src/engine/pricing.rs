use crate::models::driver::VehicleClass;

pub fn rate_per_meter(class: VehicleClass) -> f64 {
    match class {
        VehicleClass::Regular => 0.045,
        VehicleClass::Jumbo => 0.06,
    }
}

/// Fare for a trip of `distance_meters`, rounded to two decimals.
pub fn price(distance_meters: u64, class: VehicleClass) -> f64 {
    let raw = distance_meters as f64 * rate_per_meter(class);
    (raw * 100.0).round() / 100.0
}
