use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::watch;

use crate::error::ConvoyError;
use crate::hub::h_core::PositionHub;
use crate::hub::subscriber::{SubscriberQueue, Subscription};
use crate::hub::types::*;
use crate::models::{Coordinate, EndReason, PositionSample, RouteUpdate, SessionEvent};

impl PositionHub {
    /// Starts tracking a ride.
    ///
    /// Idempotent: if the ride already has a session it is left untouched.
    /// Returns whether a session already existed.
    pub fn start_session(&self, ride_id: &str, driver_id: &str, destination: Coordinate) -> bool {
        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(ride_id) {
            let state = existing.state.lock();
            if state.driver_id != driver_id {
                log::warn!(
                    "Ride {} already tracked for driver {}, ignoring start for driver {}",
                    ride_id, state.driver_id, driver_id
                );
            } else {
                log::debug!("Ride {} already has session {}", ride_id, state.session_id);
            }
            return true;
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let (position_tx, _) = watch::channel(None);
        let session = RideSession {
            state: parking_lot::Mutex::new(SessionState {
                session_id: session_id.clone(),
                ride_id: ride_id.to_string(),
                driver_id: driver_id.to_string(),
                destination,
                last_position: None,
                route: None,
                subscribers: HashMap::new(),
                position_tx: Some(position_tx),
                active: true,
                started_at: OffsetDateTime::now_utc(),
            }),
        };
        sessions.insert(ride_id.to_string(), Arc::new(session));
        drop(sessions);

        log::info!(
            "Started session {} for ride {} (driver: {})",
            session_id, ride_id, driver_id
        );
        self.emit(ride_id, HubEventType::SessionStarted);
        false
    }

    /// Stops tracking a ride and ends every subscriber stream.
    ///
    /// New publishes and subscribes fail from the moment the session leaves the
    /// map, even while buffered events are still being drained by riders.
    /// Returns whether a session existed.
    pub fn stop_session(&self, ride_id: &str) -> bool {
        let Some(session) = self.sessions.write().remove(ride_id) else {
            log::debug!("No session to stop for ride {}", ride_id);
            return false;
        };

        let riders = {
            let mut state = session.state.lock();
            state.active = false;
            // Dropping the sender ends the recomputer's feed
            state.position_tx.take();
            let riders = state.subscribers.len();
            for (_, queue) in state.subscribers.drain() {
                queue.close(EndReason::SessionStopped);
            }
            riders
        };

        log::info!("Stopped session for ride {} ({} subscribers ended)", ride_id, riders);
        self.emit(ride_id, HubEventType::SessionStopped);
        true
    }

    /// Accepts a position from the ride's driver and fans it out.
    ///
    /// # Returns
    /// - Ok(n) with the number of riders the sample was delivered to
    /// - Err(ConvoyError::NoActiveSession) if the ride is not tracked
    /// - Err(ConvoyError::DriverMismatch) if `driver_id` does not own the session
    /// - Err(ConvoyError::StalePosition) if the sample is not newer than the last one
    pub fn publish(
        &self,
        ride_id: &str,
        driver_id: &str,
        sample: PositionSample,
    ) -> Result<usize, ConvoyError> {
        let session = self
            .session(ride_id)
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;

        let delivered = {
            let mut state = session.state.lock();
            if !state.active {
                return Err(ConvoyError::NoActiveSession(ride_id.to_string()));
            }

            if state.driver_id != driver_id {
                log::warn!(
                    "Driver {} tried to publish for ride {} owned by {}",
                    driver_id, ride_id, state.driver_id
                );
                return Err(ConvoyError::DriverMismatch {
                    ride_id: ride_id.to_string(),
                    driver_id: driver_id.to_string(),
                });
            }

            if let Some(last) = &state.last_position {
                if sample.timestamp <= last.timestamp {
                    let last_ms = last.timestamp;
                    drop(state);
                    log::debug!(
                        "Rejected stale position for ride {}: {} <= {}",
                        ride_id, sample.timestamp, last_ms
                    );
                    self.emit(ride_id, HubEventType::PositionRejected(sample.timestamp));
                    return Err(ConvoyError::StalePosition {
                        ride_id: ride_id.to_string(),
                        last_ms,
                        got_ms: sample.timestamp,
                    });
                }
            }

            state.last_position = Some(sample.clone());
            let delivered = Self::fan_out(&mut state, SessionEvent::Position(sample.clone()));
            if let Some(tx) = &state.position_tx {
                tx.send_replace(Some(sample.clone()));
            }
            // Emitted under the session lock so observers see this ride's events in order
            self.emit(ride_id, HubEventType::PositionAccepted(sample.timestamp));
            delivered
        };

        Ok(delivered)
    }

    /// Stores a freshly computed route and fans it out to the ride's riders.
    ///
    /// The route must come from the session identified by `session_id`; a
    /// route computed for an earlier session of the same ride is refused with
    /// `NoActiveSession`.
    pub fn publish_route(
        &self,
        ride_id: &str,
        session_id: &str,
        route: RouteUpdate,
    ) -> Result<usize, ConvoyError> {
        let session = self
            .session(ride_id)
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;

        let mut state = session.state.lock();
        if !state.active || state.session_id != session_id {
            log::debug!(
                "Dropping route for ride {} from ended session {}",
                ride_id, session_id
            );
            return Err(ConvoyError::NoActiveSession(ride_id.to_string()));
        }

        if let Some(current) = &state.route {
            if route.based_on < current.based_on {
                log::debug!(
                    "Ignoring route for ride {} based on {} (current is based on {})",
                    ride_id, route.based_on, current.based_on
                );
                return Ok(0);
            }
        }

        state.route = Some(route.clone());
        let delivered = Self::fan_out(&mut state, SessionEvent::Route(route));
        self.emit(ride_id, HubEventType::RouteRefreshed);
        Ok(delivered)
    }

    /// Records that a route refresh failed. The current route is kept as is.
    pub fn report_route_failure(&self, ride_id: &str, reason: &str) {
        self.emit(ride_id, HubEventType::RouteFailed(reason.to_string()));
    }

    /// Subscribes a rider to a ride.
    ///
    /// The returned subscription first replays the last known position and the
    /// current route, if any, in the order other riders received them: a route
    /// based on an older sample comes before the position. Live events follow.
    /// A rider subscribing again replaces its previous subscription, which ends
    /// with [`EndReason::Replaced`].
    pub fn subscribe(&self, ride_id: &str, rider_id: &str) -> Result<Subscription, ConvoyError> {
        let session = self
            .session(ride_id)
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;

        let queue = Arc::new(SubscriberQueue::new(self.subscriber_buffer));
        {
            let mut state = session.state.lock();
            if !state.active {
                return Err(ConvoyError::NoActiveSession(ride_id.to_string()));
            }

            let route_first = matches!(
                (&state.last_position, &state.route),
                (Some(position), Some(route)) if route.based_on < position.timestamp
            );
            let position = state.last_position.clone().map(SessionEvent::Position);
            let route = state.route.clone().map(SessionEvent::Route);
            let replay = if route_first { [route, position] } else { [position, route] };
            for event in replay.into_iter().flatten() {
                queue.push(event);
            }

            if let Some(previous) = state.subscribers.insert(rider_id.to_string(), queue.clone()) {
                log::info!("Rider {} resubscribed to ride {}", rider_id, ride_id);
                previous.close(EndReason::Replaced);
            }
            self.emit(ride_id, HubEventType::SubscriberJoined(rider_id.to_string()));
        }

        log::info!("Rider {} subscribed to ride {}", rider_id, ride_id);
        Ok(Subscription::new(ride_id.to_string(), rider_id.to_string(), queue))
    }

    /// Removes a rider from a ride. Idempotent; returns whether the rider was subscribed.
    pub fn unsubscribe(&self, ride_id: &str, rider_id: &str) -> bool {
        let Some(session) = self.session(ride_id) else {
            return false;
        };

        let removed = session.state.lock().subscribers.remove(rider_id);
        match removed {
            Some(queue) => {
                queue.close(EndReason::Unsubscribed);
                log::info!("Rider {} unsubscribed from ride {}", rider_id, ride_id);
                self.emit(ride_id, HubEventType::SubscriberLeft(rider_id.to_string()));
                true
            }
            None => false,
        }
    }

    pub fn has_session(&self, ride_id: &str) -> bool {
        self.sessions.read().contains_key(ride_id)
    }

    pub fn last_position(&self, ride_id: &str) -> Result<Option<PositionSample>, ConvoyError> {
        Ok(self.snapshot(ride_id)?.last_position)
    }

    pub fn current_route(&self, ride_id: &str) -> Result<Option<RouteUpdate>, ConvoyError> {
        let session = self
            .session(ride_id)
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;
        let route = session.state.lock().route.clone();
        Ok(route)
    }

    pub fn snapshot(&self, ride_id: &str) -> Result<SessionSnapshot, ConvoyError> {
        let session = self
            .session(ride_id)
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;
        let snapshot = session.state.lock().snapshot();
        Ok(snapshot)
    }

    /// Hands out the position feed used by the route recomputer.
    pub fn feed(&self, ride_id: &str) -> Result<SessionFeed, ConvoyError> {
        let session = self
            .session(ride_id)
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;
        let state = session.state.lock();
        let tx = state
            .position_tx
            .as_ref()
            .ok_or_else(|| ConvoyError::NoActiveSession(ride_id.to_string()))?;
        Ok(SessionFeed {
            ride_id: ride_id.to_string(),
            session_id: state.session_id.clone(),
            destination: state.destination,
            positions: tx.subscribe(),
        })
    }

    /// Pushes an event to every subscriber, pruning those whose reader went away.
    fn fan_out(state: &mut SessionState, event: SessionEvent) -> usize {
        let ride_id = state.ride_id.clone();
        state.subscribers.retain(|rider_id, queue| {
            let alive = queue.push(event.clone());
            if !alive {
                log::debug!("Pruned detached rider {} from ride {}", rider_id, ride_id);
            }
            alive
        });
        state.subscribers.len()
    }
}
