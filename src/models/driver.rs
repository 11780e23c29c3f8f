use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A validated WGS84 position. Construction rejects latitudes outside
/// ±90 and longitudes outside ±180, including when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = AppError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Coordinate::new(raw.lat, raw.lng)
    }
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, AppError> {
        let in_range = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);

        if !in_range {
            return Err(AppError::InvalidCoordinate { lat, lng });
        }

        Ok(Self { lat, lng })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    Regular,
    Jumbo,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Regular => "Regular",
            VehicleClass::Jumbo => "Jumbo",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(VehicleClass::Regular),
            "jumbo" => Ok(VehicleClass::Jumbo),
            _ => Err(AppError::UnknownVehicleClass(raw.to_string())),
        }
    }
}

/// A point-in-time snapshot of a driver as reported by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub vehicle_number: String,
    pub user_id: String,
    pub vehicle_class: VehicleClass,
    pub location: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverContact {
    pub name: String,
    pub phone: String,
}

impl DriverContact {
    pub fn unknown() -> Self {
        Self {
            name: "unknown".to_string(),
            phone: "unknown".to_string(),
        }
    }
}
