use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("geocoding failed: {0}")]
    Geocode(String),

    #[error("routing failed: {0}")]
    Routing(String),

    #[error("driver directory failed: {0}")]
    Directory(String),

    #[error("no drivers found nearby")]
    NoDriversFound,

    #[error("no usable route")]
    NoUsableRoute,

    #[error("ride not found or already taken")]
    OfferNotFound,

    #[error("unknown vehicle class: {0}")]
    UnknownVehicleClass(String),

    #[error("invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the failure came from an external collaborator rather than
    /// from a dispatch outcome or bad input.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AppError::Geocode(_) | AppError::Routing(_) | AppError::Directory(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Geocode(_) | AppError::Routing(_) | AppError::Directory(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::NoDriversFound | AppError::NoUsableRoute => StatusCode::SERVICE_UNAVAILABLE,
            AppError::OfferNotFound => StatusCode::NOT_FOUND,
            AppError::UnknownVehicleClass(_)
            | AppError::InvalidCoordinate { .. }
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
