//! Contracts for the services a dispatch depends on, plus their HTTP clients.

pub mod directory;
pub mod google_maps;
pub mod open_weather;
pub mod traffic_model;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::driver::{Coordinate, Driver, DriverContact, VehicleClass};
use crate::models::route::{RouteMode, RouteOption};

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Coordinate, AppError>;
}

#[async_trait]
pub trait RouteService: Send + Sync {
    async fn routes(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: RouteMode,
    ) -> Result<Vec<RouteOption>, AppError>;
}

/// Short-term precipitation at a point. Missing data reads as zero.
#[async_trait]
pub trait WeatherService: Send + Sync {
    async fn precipitation(&self, at: Coordinate) -> f64;
}

#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn drivers_by_class(&self, class: VehicleClass) -> Result<Vec<Driver>, AppError>;

    async fn contact_info(&self, vehicle_number: &str) -> Result<DriverContact, AppError>;
}

/// Maps a rain signal to a traffic volume multiplier.
pub trait TrafficModel: Send + Sync {
    fn predict(&self, rain: f64) -> f64;
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))
}
