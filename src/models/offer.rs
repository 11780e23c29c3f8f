use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::{Coordinate, DriverContact, VehicleClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RideOfferState {
    Pending,
    Accepted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub path: Vec<Coordinate>,
    pub distance_meters: u64,
    pub minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideOffer {
    pub ride_id: Uuid,
    pub driver_user_id: String,
    pub driver_vehicle_number: String,
    pub driver_contact: DriverContact,
    pub vehicle_class: VehicleClass,
    pub pickup: String,
    pub drop: String,
    pub driver_to_customer: RouteLeg,
    pub customer_to_destination: RouteLeg,
    pub price: f64,
    pub state: RideOfferState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RideOffer {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum OfferStatus {
    Accepted { ride_details: RideOffer },
    Pending,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub price: f64,
    pub arrival_time: u64,
    pub trip_time: u64,
}
