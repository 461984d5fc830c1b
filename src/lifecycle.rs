//! Ride status as reported by the external ride lifecycle authority.
//!
//! The service never advances a ride's status itself. It only reacts to the
//! statuses it is told about by starting or stopping live tracking.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Confirmed,
    DriverOnWay,
    DriverArrived,
    TripStarted,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Whether a ride in this status has a live tracking session.
    ///
    /// `trip_started` is always tracked. The approach phases (`driver_on_way`,
    /// `driver_arrived`) are tracked only when `track_approach_phases` is set.
    pub fn is_tracked(self, track_approach_phases: bool) -> bool {
        match self {
            RideStatus::TripStarted => true,
            RideStatus::DriverOnWay | RideStatus::DriverArrived => track_approach_phases,
            _ => false,
        }
    }

    /// Completed and cancelled rides never come back.
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}
