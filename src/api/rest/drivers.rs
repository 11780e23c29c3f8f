use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Serialize;

use crate::models::offer::RideOffer;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/get-pending-trips/:driver_id", get(pending_trip))
}

#[derive(Serialize)]
pub struct PendingTrip {
    pub trip: Option<RideOffer>,
}

async fn pending_trip(
    State(state): State<Arc<AppState>>,
    Path(driver_id): Path<String>,
) -> Json<PendingTrip> {
    Json(PendingTrip {
        trip: state.lifecycle.peek_pending(&driver_id, Utc::now()),
    })
}
