use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AppError;
use crate::external::{Geocoder, RouteService};
use crate::geo::polyline;
use crate::models::driver::Coordinate;
use crate::models::route::{RouteMode, RouteOption};

#[derive(Clone)]
pub struct GoogleMapsClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GoogleMapsClient {
    pub fn new(http: reqwest::Client, api_base: String, api_key: String) -> Self {
        Self {
            http,
            api_base,
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Deserialize)]
struct Geometry {
    location: Coordinate,
}

#[derive(Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
    overview_polyline: OverviewPolyline,
}

#[derive(Deserialize)]
struct DirectionsLeg {
    distance: Measure,
    duration: Measure,
    duration_in_traffic: Option<Measure>,
}

#[derive(Deserialize)]
struct Measure {
    value: u64,
}

#[derive(Deserialize)]
struct OverviewPolyline {
    points: String,
}

impl TryFrom<DirectionsRoute> for RouteOption {
    type Error = AppError;

    fn try_from(route: DirectionsRoute) -> Result<Self, Self::Error> {
        let leg = route
            .legs
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Routing("route has no legs".to_string()))?;

        let path = polyline::decode(&route.overview_polyline.points)?;
        if path.is_empty() {
            return Err(AppError::Routing("route has an empty path".to_string()));
        }

        Ok(RouteOption {
            distance_meters: leg.distance.value,
            duration_seconds: leg.duration.value,
            traffic_duration_seconds: leg.duration_in_traffic.map(|m| m.value),
            path,
        })
    }
}

fn lat_lng(point: Coordinate) -> String {
    format!("{},{}", point.lat, point.lng)
}

#[async_trait]
impl Geocoder for GoogleMapsClient {
    #[tracing::instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<Coordinate, AppError> {
        let url = format!("https://{}/maps/api/geocode/json", self.api_base);

        let res = self
            .http
            .get(url)
            .query(&[("address", address), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| AppError::Geocode(err.to_string()))?;

        if !res.status().is_success() {
            return Err(AppError::Geocode(format!("http status {}", res.status())));
        }

        let data: GeocodeResponse = res
            .json()
            .await
            .map_err(|err| AppError::Geocode(format!("malformed response: {err}")))?;

        if data.status != "OK" {
            return Err(AppError::Geocode(data.status));
        }

        data.results
            .into_iter()
            .next()
            .map(|result| result.geometry.location)
            .ok_or_else(|| AppError::Geocode(format!("no results for {address}")))
    }
}

#[async_trait]
impl RouteService for GoogleMapsClient {
    #[tracing::instrument(skip(self))]
    async fn routes(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        mode: RouteMode,
    ) -> Result<Vec<RouteOption>, AppError> {
        let url = format!("https://{}/maps/api/directions/json", self.api_base);

        let mut query = vec![
            ("origin", lat_lng(origin)),
            ("destination", lat_lng(destination)),
            ("alternatives", "true".to_string()),
            ("mode", "driving".to_string()),
            ("key", self.api_key.clone()),
        ];
        if mode == RouteMode::TrafficAware {
            query.push(("departure_time", "now".to_string()));
        }

        let res = self
            .http
            .get(url)
            .query(&query)
            .send()
            .await
            .map_err(|err| AppError::Routing(err.to_string()))?;

        if !res.status().is_success() {
            return Err(AppError::Routing(format!("http status {}", res.status())));
        }

        let data: DirectionsResponse = res
            .json()
            .await
            .map_err(|err| AppError::Routing(format!("malformed response: {err}")))?;

        if data.status != "OK" {
            return Err(AppError::Routing(data.status));
        }

        data.routes.into_iter().map(RouteOption::try_from).collect()
    }
}
