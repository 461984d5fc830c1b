use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::hub::subscriber::SubscriberQueue;
use crate::models::{Coordinate, PositionSample, RouteUpdate};

/// Event emitted when a ride session changes.
/// These events are broadcast to observers such as the service's metrics collector.
#[derive(Clone, Debug)]
pub struct HubEvent {
    pub ride_id: String,
    pub event_type: HubEventType,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HubEventType {
    SessionStarted,
    SessionStopped,
    SubscriberJoined(String),
    SubscriberLeft(String),
    PositionAccepted(i64),
    PositionRejected(i64),
    RouteRefreshed,
    RouteFailed(String),
}

/// Read-only copy of a session's state.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub ride_id: String,
    pub driver_id: String,
    pub destination: Coordinate,
    pub last_position: Option<PositionSample>,
    pub route: Option<RouteUpdate>,
    pub subscribers: Vec<String>,
    pub started_at: OffsetDateTime,
}

/// Mutable state of one ride session. Only touched under the session's lock.
pub(super) struct SessionState {
    pub(super) session_id: String,
    pub(super) ride_id: String,
    pub(super) driver_id: String,
    pub(super) destination: Coordinate,
    pub(super) last_position: Option<PositionSample>,
    pub(super) route: Option<RouteUpdate>,
    /// Subscribers by rider id
    pub(super) subscribers: HashMap<String, Arc<SubscriberQueue>>,
    /// Latest accepted position, watched by the route recomputer.
    /// Taken (and so closed) when the session stops.
    pub(super) position_tx: Option<watch::Sender<Option<PositionSample>>>,
    pub(super) active: bool,
    pub(super) started_at: OffsetDateTime,
}

impl SessionState {
    pub(super) fn snapshot(&self) -> SessionSnapshot {
        let mut subscribers: Vec<String> = self.subscribers.keys().cloned().collect();
        subscribers.sort();
        SessionSnapshot {
            session_id: self.session_id.clone(),
            ride_id: self.ride_id.clone(),
            driver_id: self.driver_id.clone(),
            destination: self.destination,
            last_position: self.last_position.clone(),
            route: self.route.clone(),
            subscribers,
            started_at: self.started_at,
        }
    }
}

/// One live ride: its state behind a lock scoped to this ride only.
pub(super) struct RideSession {
    pub(super) state: parking_lot::Mutex<SessionState>,
}

/// What the route recomputer needs to follow a session.
pub struct SessionFeed {
    pub ride_id: String,
    /// Routes are only accepted back into this session
    pub session_id: String,
    pub destination: Coordinate,
    /// Changes on every accepted position; closed when the session stops.
    pub positions: watch::Receiver<Option<PositionSample>>,
}
