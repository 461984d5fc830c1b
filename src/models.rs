//! Data models for the Convoy service.
//! Defines the core value types shared by the matcher, the position hub and the
//! route recomputer, plus the request/response bodies of the HTTP API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use time::Date;

use crate::error::ConvoyError;
use crate::lifecycle::RideStatus;

/// Identifier of a published ride offer.
pub type RideOfferId = String;
/// Identifier of a ride with an accepted booking.
pub type RideId = String;

/// Geographic location represented by latitude and longitude (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees (-90 to 90)
    pub lat: f64,
    /// Longitude in degrees (-180 to 180)
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Rejects non-finite values and values outside the WGS84 ranges.
    ///
    /// The matcher and the hub assume coordinates were checked here first.
    pub fn validate(&self) -> Result<(), ConvoyError> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(ConvoyError::InvalidCoordinate(format!(
                "coordinate ({}, {}) is not finite",
                self.lat, self.lon
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(ConvoyError::InvalidCoordinate(format!(
                "coordinate ({}, {}) is out of range",
                self.lat, self.lon
            )));
        }
        Ok(())
    }
}

/// Publication state of a ride offer. Only `Published` offers are matchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Published,
    Completed,
    Cancelled,
}

/// A shared ride published by a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideOffer {
    pub id: RideOfferId,
    pub driver_id: String,
    /// Where the ride starts
    pub pickup: Coordinate,
    /// Where the ride ends
    pub drop: Coordinate,
    pub seats_available: u32,
    /// Price per seat in minor currency units
    pub price_per_seat: u64,
    pub ride_date: Date,
    pub status: OfferStatus,
}

/// A traveler's search: where they want to be picked up and dropped off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub pickup: Coordinate,
    pub drop: Coordinate,
}

/// One driver location report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Unix timestamp in milliseconds when the position was taken
    pub timestamp: i64,
    /// Heading in degrees clockwise from north
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    /// Speed in meters per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Traffic density label of a stretch of route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Low,
    Moderate,
    Heavy,
}

/// A run of consecutive route points sharing one congestion level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub level: CongestionLevel,
    pub coordinates: Vec<Coordinate>,
}

/// Route and ETA computed from one driver position to the ride's destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteUpdate {
    pub geometry: Vec<Coordinate>,
    /// Unix timestamp in milliseconds of the expected arrival
    pub eta: i64,
    pub remaining_distance_m: f64,
    pub duration_s: f64,
    pub segments: Vec<PathSegment>,
    /// Initial heading in degrees (0-360) from the driver towards the route
    pub heading: f64,
    /// Timestamp of the position sample this route was computed from
    pub based_on: i64,
    /// Unix timestamp in milliseconds when the route was computed
    pub computed_at: i64,
}

/// Why a subscription stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The ride left the tracking phase
    SessionStopped,
    /// The rider unsubscribed
    Unsubscribed,
    /// The same rider subscribed again from another connection
    Replaced,
}

/// Message delivered to ride subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    Position(PositionSample),
    Route(RouteUpdate),
    Ended(EndReason),
}

impl SessionEvent {
    /// Name used for the server-sent `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Position(_) => "position",
            SessionEvent::Route(_) => "route",
            SessionEvent::Ended(_) => "ended",
        }
    }
}

/// Request body for `POST /rides/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub pickup: Coordinate,
    pub drop: Coordinate,
}

/// Response body for `POST /rides/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matched offer ids, in candidate order
    pub ride_ids: Vec<RideOfferId>,
    pub count: usize,
}

/// Request body for `POST /rides/{ride_id}/status`, sent by the ride lifecycle authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: RideStatus,
    pub driver_id: String,
    pub destination: Coordinate,
}

/// Tracking state of a ride after a status update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingState {
    pub ride_id: RideId,
    pub status: RideStatus,
    pub tracking: bool,
    /// Whether a session was already running before this update
    pub already_tracking: bool,
}

/// Request body for `POST /rides/{ride_id}/positions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionReport {
    pub driver_id: String,
    pub coordinate: Coordinate,
    pub timestamp: i64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
}

impl PositionReport {
    pub fn sample(&self) -> PositionSample {
        PositionSample {
            coordinate: self.coordinate,
            timestamp: self.timestamp,
            heading: self.heading,
            speed: self.speed,
        }
    }
}

/// Response body for an accepted position report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionAck {
    pub ride_id: RideId,
    pub timestamp: i64,
    pub subscribers: usize,
}

/// Health status information for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall service status ("ok" or "error")
    pub status: String,
    /// Current version of the service
    pub version: String,
    /// Time since service start in seconds
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    /// Additional counters
    pub metrics: HashMap<String, u64>,
}
