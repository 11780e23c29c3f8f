use serde::{Deserialize, Serialize};

use crate::models::driver::Coordinate;

/// Whether the routing service should be asked for live-traffic durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMode {
    TrafficAware,
    Nominal,
}

/// One alternative returned by the routing service, path already decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    pub traffic_duration_seconds: Option<u64>,
    pub path: Vec<Coordinate>,
}

impl RouteOption {
    /// Live-traffic duration when the provider reported one, nominal otherwise.
    pub fn base_duration_seconds(&self) -> u64 {
        self.traffic_duration_seconds.unwrap_or(self.duration_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRoute {
    pub route: RouteOption,
    pub avg_rain: f64,
    pub factor: f64,
    pub adjusted_duration_seconds: u64,
}

/// The distance-optimal alternative between two points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShortestRoute {
    pub distance_meters: u64,
    pub path: Vec<Coordinate>,
}
