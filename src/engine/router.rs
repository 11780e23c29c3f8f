use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::error::AppError;
use crate::external::{RouteService, TrafficModel, WeatherService};
use crate::models::driver::Coordinate;
use crate::models::route::{RouteMode, RouteOption, ScoredRoute, ShortestRoute};

/// Added to the dry-weather prediction so the factor is always defined.
const BASELINE_EPSILON: f64 = 1e-6;

/// Ranks alternative routes by duration scaled with a rain-driven traffic
/// factor sampled along each route's path.
#[derive(Clone)]
pub struct TrafficAdjustedRouter {
    routes: Arc<dyn RouteService>,
    weather: Arc<dyn WeatherService>,
    model: Arc<dyn TrafficModel>,
}

impl TrafficAdjustedRouter {
    pub fn new(
        routes: Arc<dyn RouteService>,
        weather: Arc<dyn WeatherService>,
        model: Arc<dyn TrafficModel>,
    ) -> Self {
        Self {
            routes,
            weather,
            model,
        }
    }

    /// Ratio of predicted traffic at `avg_rain` to predicted dry traffic.
    pub fn traffic_factor(&self, avg_rain: f64) -> f64 {
        let predicted = self.model.predict(avg_rain).max(0.0);
        let baseline = self.model.predict(0.0).max(0.0) + BASELINE_EPSILON;
        predicted / baseline
    }

    pub async fn score_route(&self, route: RouteOption, sample_stride: usize) -> ScoredRoute {
        let samples = sample_points(&route.path, sample_stride);
        let readings = join_all(samples.iter().map(|point| self.weather.precipitation(*point))).await;

        let usable: Vec<f64> = readings
            .into_iter()
            .filter(|rain| rain.is_finite())
            .map(|rain| rain.max(0.0))
            .collect();
        let avg_rain = if usable.is_empty() {
            0.0
        } else {
            usable.iter().sum::<f64>() / usable.len() as f64
        };

        let factor = self.traffic_factor(avg_rain);
        // Rounded, not truncated: the dry factor sits just under 1.
        let adjusted_duration_seconds = (route.base_duration_seconds() as f64 * factor).round() as u64;

        ScoredRoute {
            route,
            avg_rain,
            factor,
            adjusted_duration_seconds,
        }
    }

    /// Minimum adjusted travel time in whole minutes across all alternatives,
    /// or `None` when the routing service returned no route.
    #[tracing::instrument(skip(self))]
    pub async fn best_travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        sample_stride: usize,
    ) -> Result<Option<u64>, AppError> {
        let alternatives = self
            .routes
            .routes(origin, destination, RouteMode::TrafficAware)
            .await?;

        let mut best: Option<u64> = None;
        for route in alternatives {
            let scored = self.score_route(route, sample_stride).await;
            debug!(
                base_seconds = scored.route.base_duration_seconds(),
                avg_rain = scored.avg_rain,
                factor = scored.factor,
                adjusted_seconds = scored.adjusted_duration_seconds,
                "scored route"
            );

            if best.map_or(true, |current| scored.adjusted_duration_seconds < current) {
                best = Some(scored.adjusted_duration_seconds);
            }
        }

        Ok(best.map(|seconds| seconds / 60))
    }

    /// The alternative with the smallest raw distance; the first one wins ties.
    #[tracing::instrument(skip(self))]
    pub async fn shortest_route(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Option<ShortestRoute>, AppError> {
        let alternatives = self
            .routes
            .routes(origin, destination, RouteMode::Nominal)
            .await?;

        Ok(alternatives
            .into_iter()
            .min_by_key(|route| route.distance_meters)
            .map(|route| ShortestRoute {
                distance_meters: route.distance_meters,
                path: route.path,
            }))
    }
}

/// Every `stride`-th point starting with the first; the whole path if that
/// leaves nothing.
pub fn sample_points(path: &[Coordinate], stride: usize) -> Vec<Coordinate> {
    let sampled: Vec<Coordinate> = path.iter().step_by(stride.max(1)).copied().collect();
    if sampled.is_empty() {
        path.to_vec()
    } else {
        sampled
    }
}
