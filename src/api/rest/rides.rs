use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::VehicleClass;
use crate::models::offer::{OfferStatus, Quote};
use crate::observability::metrics::outcome_label;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/evaluate-price", post(evaluate_price))
        .route("/request-ride", post(request_ride))
        .route("/accept-ride", post(accept_ride))
        .route("/check-ride-status/:ride_id", get(check_ride_status))
}

#[derive(Deserialize)]
pub struct RideRequest {
    pub pickup: String,
    pub drop: String,
    pub vehicle_type: String,
}

impl RideRequest {
    fn validate(&self) -> Result<VehicleClass, AppError> {
        if self.pickup.trim().is_empty() {
            return Err(AppError::BadRequest("pickup cannot be empty".to_string()));
        }
        if self.drop.trim().is_empty() {
            return Err(AppError::BadRequest("drop cannot be empty".to_string()));
        }

        self.vehicle_type.parse()
    }
}

#[derive(Serialize)]
pub struct RideRequested {
    pub ride_id: Uuid,
    pub status: &'static str,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub driver_id: String,
    pub ride_id: String,
}

#[derive(Serialize)]
pub struct AcceptResponse {
    pub status: &'static str,
    pub message: &'static str,
}

fn record<T>(state: &AppState, kind: &str, started: Instant, result: &Result<T, AppError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(err) => outcome_label(err),
    };
    state
        .metrics
        .observe_dispatch(kind, outcome, started.elapsed().as_secs_f64());

    if let Err(err) = result {
        warn!(error = %err, kind, outcome, "ride request failed");
    }
}

async fn evaluate_price(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RideRequest>,
) -> Result<Json<Quote>, AppError> {
    let class = payload.validate()?;

    let started = Instant::now();
    let result = state
        .coordinator
        .quote(&payload.pickup, &payload.drop, class)
        .await;
    record(&state, "quote", started, &result);

    Ok(Json(result?))
}

async fn request_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RideRequest>,
) -> Result<Json<RideRequested>, AppError> {
    let class = payload.validate()?;

    let started = Instant::now();
    let result = state
        .coordinator
        .dispatch(&payload.pickup, &payload.drop, class)
        .await;
    record(&state, "dispatch", started, &result);
    let offer = result?;

    state
        .metrics
        .pending_offers
        .set(state.lifecycle.pending_count() as i64);

    Ok(Json(RideRequested {
        ride_id: offer.ride_id,
        status: "pending",
    }))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<AcceptResponse>, AppError> {
    let ride_id = Uuid::parse_str(payload.ride_id.trim()).map_err(|_| AppError::OfferNotFound)?;

    state
        .lifecycle
        .accept(&payload.driver_id, ride_id, Utc::now())?;

    state.metrics.offers_accepted_total.inc();
    state
        .metrics
        .pending_offers
        .set(state.lifecycle.pending_count() as i64);

    Ok(Json(AcceptResponse {
        status: "success",
        message: "Ride accepted",
    }))
}

async fn check_ride_status(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
) -> Json<OfferStatus> {
    let status = match Uuid::parse_str(ride_id.trim()) {
        Ok(ride_id) => state.lifecycle.status(ride_id, Utc::now()),
        Err(_) => OfferStatus::Unknown,
    };

    Json(status)
}
