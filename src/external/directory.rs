use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::external::DriverDirectory;
use crate::models::driver::{Coordinate, Driver, DriverContact, VehicleClass};

/// Client for the driver directory web app, which answers `action=`
/// queries with a `{"status": "success", ...}` envelope.
#[derive(Clone)]
pub struct DriverDirectoryClient {
    http: reqwest::Client,
    url: String,
}

impl DriverDirectoryClient {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[derive(Deserialize)]
struct LocationsResponse {
    status: String,
    /// Rows are parsed one at a time so a malformed row is skipped instead
    /// of failing the whole snapshot.
    #[serde(default)]
    locations: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct LocationEntry {
    #[serde(default, deserialize_with = "loose_opt_string")]
    vehicle_no: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    longitude: Option<f64>,
    #[serde(default, deserialize_with = "loose_opt_string")]
    user_id: Option<String>,
    #[serde(default, deserialize_with = "loose_opt_string")]
    vehicle_type: Option<String>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    status: String,
    driver: Option<DetailsEntry>,
}

#[derive(Deserialize)]
struct DetailsEntry {
    name: Option<String>,
    #[serde(default, deserialize_with = "loose_opt_string")]
    phone: Option<String>,
}

/// Sheet-backed values arrive as either JSON numbers or strings.
fn loose_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn loose_opt_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl LocationEntry {
    fn into_driver(self, class: VehicleClass) -> Option<Driver> {
        if self.vehicle_type?.parse::<VehicleClass>().ok()? != class {
            return None;
        }

        let (Some(vehicle_no), Some(user_id)) = (self.vehicle_no, self.user_id) else {
            warn!("skipping directory entry without vehicle number or user id");
            return None;
        };

        let location = match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Coordinate::new(lat, lng).ok(),
            _ => None,
        };

        let Some(location) = location else {
            warn!(vehicle_no = %vehicle_no, "skipping directory entry with unusable coordinates");
            return None;
        };

        Some(Driver {
            vehicle_number: vehicle_no,
            user_id,
            vehicle_class: class,
            location,
        })
    }
}

fn drivers_of_class(data: LocationsResponse, class: VehicleClass) -> Result<Vec<Driver>, AppError> {
    if data.status != "success" {
        return Err(AppError::Directory(format!(
            "failed to fetch driver locations: {}",
            data.status
        )));
    }

    Ok(data
        .locations
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<LocationEntry>(row) {
            Ok(entry) => entry.into_driver(class),
            Err(err) => {
                warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .collect())
}

fn contact_from(data: DetailsResponse) -> Option<DriverContact> {
    if data.status != "success" {
        return None;
    }

    let driver = data.driver?;
    let fallback = DriverContact::unknown();
    Some(DriverContact {
        name: driver.name.unwrap_or(fallback.name),
        phone: driver.phone.unwrap_or(fallback.phone),
    })
}

#[async_trait]
impl DriverDirectory for DriverDirectoryClient {
    #[tracing::instrument(skip(self))]
    async fn drivers_by_class(&self, class: VehicleClass) -> Result<Vec<Driver>, AppError> {
        let data: LocationsResponse = self
            .http
            .get(&self.url)
            .query(&[("action", "getLocations")])
            .send()
            .await
            .map_err(|err| AppError::Directory(err.to_string()))?
            .json()
            .await
            .map_err(|err| AppError::Directory(format!("malformed response: {err}")))?;

        let drivers = drivers_of_class(data, class)?;
        debug!(count = drivers.len(), "fetched driver snapshot");
        Ok(drivers)
    }

    #[tracing::instrument(skip(self))]
    async fn contact_info(&self, vehicle_number: &str) -> Result<DriverContact, AppError> {
        let data: DetailsResponse = self
            .http
            .get(&self.url)
            .query(&[("action", "getDriverDetails"), ("vehicle_no", vehicle_number)])
            .send()
            .await
            .map_err(|err| AppError::Directory(err.to_string()))?
            .json()
            .await
            .map_err(|err| AppError::Directory(format!("malformed response: {err}")))?;

        contact_from(data)
            .ok_or_else(|| AppError::Directory(format!("no details for vehicle {vehicle_number}")))
    }
}
