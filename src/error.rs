use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvoyError {
    #[error("Stale position for ride {ride_id}: {got_ms} is not after {last_ms}")]
    StalePosition {
        ride_id: String,
        last_ms: i64,
        got_ms: i64,
    },

    #[error("No active session for ride {0}")]
    NoActiveSession(String),

    #[error("Directions provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Driver {driver_id} is not the driver of ride {ride_id}")]
    DriverMismatch { ride_id: String, driver_id: String },

    #[error("Invalid request data: {0}")]
    ValidationError(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ResponseError for ConvoyError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ConvoyError::ValidationError(msg) => HttpResponse::BadRequest().json(json!({
                "error": "validation_error",
                "message": msg
            })),
            ConvoyError::InvalidCoordinate(msg) => HttpResponse::BadRequest().json(json!({
                "error": "invalid_coordinate",
                "message": msg
            })),
            ConvoyError::DriverMismatch { .. } => HttpResponse::Forbidden().json(json!({
                "error": "driver_mismatch",
                "message": self.to_string()
            })),
            ConvoyError::NoActiveSession(_) => HttpResponse::NotFound().json(json!({
                "error": "no_active_session",
                "message": self.to_string()
            })),
            ConvoyError::StalePosition { .. } => HttpResponse::Conflict().json(json!({
                "error": "stale_position",
                "message": self.to_string()
            })),
            ConvoyError::ProviderUnavailable(msg) => {
                log::warn!("Directions provider unavailable: {}", msg);
                HttpResponse::ServiceUnavailable().json(json!({
                    "error": "provider_unavailable",
                    "message": "Route is temporarily unavailable"
                }))
            }
            ConvoyError::Internal(msg) => {
                log::error!("Internal error: {}", msg);
                HttpResponse::InternalServerError().json(json!({
                    "error": "internal_error",
                    "message": "An internal server error occurred"
                }))
            }
        }
    }
}
