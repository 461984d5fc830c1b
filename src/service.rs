use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use crate::config::TrackingConfig;
use crate::corridor::CorridorMatcher;
use crate::error::ConvoyError;
use crate::hub::{HubEventType, PositionHub, Subscription};
use crate::models::{
    Coordinate, HealthStatus, MatchQuery, PositionAck, PositionReport, RouteUpdate, SearchRequest,
    SearchResponse, StatusUpdate, TrackingState,
};
use crate::offers::CandidateOfferSource;
use crate::route::{DirectionsProvider, Recomputer};

/// Counters fed by hub events.
#[derive(Default)]
struct ServiceMetrics {
    searches: AtomicU64,
    sessions_started: AtomicU64,
    sessions_stopped: AtomicU64,
    positions_accepted: AtomicU64,
    positions_rejected: AtomicU64,
    routes_refreshed: AtomicU64,
    route_failures: AtomicU64,
}

#[derive(Clone)]
/// Front door of the core: corridor search, ride lifecycle hooks, driver
/// positions and rider subscriptions.
pub struct TrackingService {
    hub: PositionHub,
    recomputer: Recomputer,
    matcher: CorridorMatcher,
    offers: Arc<dyn CandidateOfferSource>,
    config: TrackingConfig,
    /// Service start time for calculating uptime
    start_time: Arc<Instant>,
    metrics: Arc<ServiceMetrics>,
}

impl TrackingService {
    /// Creates the service. Must be called within a tokio runtime.
    pub fn new(
        config: Option<TrackingConfig>,
        offers: Arc<dyn CandidateOfferSource>,
        provider: Arc<dyn DirectionsProvider>,
    ) -> Self {
        let config = config.unwrap_or_default();
        let hub = PositionHub::new(config.hub_event_buffer, config.subscriber_buffer);
        let recomputer = Recomputer::new(hub.clone(), provider, &config);
        let service = Self {
            hub,
            recomputer,
            matcher: CorridorMatcher::new(),
            offers,
            config,
            start_time: Arc::new(Instant::now()),
            metrics: Arc::new(ServiceMetrics::default()),
        };

        service.start_metrics_collection();
        service
    }

    /// Counts hub events for the health endpoint
    fn start_metrics_collection(&self) {
        let mut rx = self.hub.events();
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let counter = match event.event_type {
                            HubEventType::SessionStarted => &metrics.sessions_started,
                            HubEventType::SessionStopped => &metrics.sessions_stopped,
                            HubEventType::PositionAccepted(_) => &metrics.positions_accepted,
                            HubEventType::PositionRejected(_) => &metrics.positions_rejected,
                            HubEventType::RouteRefreshed => &metrics.routes_refreshed,
                            HubEventType::RouteFailed(_) => &metrics.route_failures,
                            _ => continue,
                        };
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Metrics collector lagged, skipped {} hub events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn hub(&self) -> &PositionHub {
        &self.hub
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Finds published offers whose route plausibly serves the traveler.
    ///
    /// # Returns
    /// - Ok(SearchResponse) with matched ids in candidate order (possibly empty)
    /// - Err(ConvoyError::InvalidCoordinate) if either coordinate is invalid
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse, ConvoyError> {
        request.pickup.validate()?;
        request.drop.validate()?;

        let today = OffsetDateTime::now_utc().date();
        let candidates = self.offers.published_offers(today).await?;
        let query = MatchQuery {
            pickup: request.pickup,
            drop: request.drop,
        };
        let ride_ids = self.matcher.match_offers(&query, &candidates);
        self.metrics.searches.fetch_add(1, Ordering::Relaxed);

        log::info!(
            "Search matched {} of {} published offers",
            ride_ids.len(),
            candidates.len()
        );
        Ok(SearchResponse {
            count: ride_ids.len(),
            ride_ids,
        })
    }

    /// Reacts to a status change reported by the ride lifecycle authority.
    ///
    /// Entering a tracked status starts the session and its route recomputer;
    /// any other status stops tracking.
    pub fn apply_status(&self, ride_id: &str, update: StatusUpdate) -> Result<TrackingState, ConvoyError> {
        let tracked = update.status.is_tracked(self.config.track_approach_phases);
        log::info!(
            "Ride {} is now {:?} (tracked: {})",
            ride_id, update.status, tracked
        );

        if tracked {
            let already_tracking = self.start_tracking(ride_id, &update.driver_id, update.destination)?;
            Ok(TrackingState {
                ride_id: ride_id.to_string(),
                status: update.status,
                tracking: true,
                already_tracking,
            })
        } else {
            let was_tracking = self.stop_tracking(ride_id);
            if update.status.is_terminal() {
                log::info!("Ride {} finished as {:?}", ride_id, update.status);
            }
            Ok(TrackingState {
                ride_id: ride_id.to_string(),
                status: update.status,
                tracking: false,
                already_tracking: was_tracking,
            })
        }
    }

    /// Starts a session for the ride, and its recomputer if the session is new.
    /// Returns whether a session already existed.
    pub fn start_tracking(
        &self,
        ride_id: &str,
        driver_id: &str,
        destination: Coordinate,
    ) -> Result<bool, ConvoyError> {
        if ride_id.trim().is_empty() || driver_id.trim().is_empty() {
            return Err(ConvoyError::ValidationError(
                "ride_id and driver_id must not be empty".to_string(),
            ));
        }
        destination.validate()?;

        let existed = self.hub.start_session(ride_id, driver_id, destination);
        if !existed {
            self.recomputer.spawn(ride_id)?;
        }
        Ok(existed)
    }

    /// Stops the ride's session. Returns whether one was running.
    pub fn stop_tracking(&self, ride_id: &str) -> bool {
        self.hub.stop_session(ride_id)
    }

    /// Publishes a driver position for a ride.
    ///
    /// # Returns
    /// - Ok(PositionAck) if accepted
    /// - Err(ConvoyError::InvalidCoordinate) for an invalid coordinate
    /// - Err(ConvoyError::NoActiveSession) if the ride is not tracked
    /// - Err(ConvoyError::DriverMismatch) if the report comes from another driver
    /// - Err(ConvoyError::StalePosition) if the sample is not newer than the last one
    pub fn publish_position(&self, ride_id: &str, report: PositionReport) -> Result<PositionAck, ConvoyError> {
        report.coordinate.validate()?;
        if let Some(heading) = report.heading {
            if !heading.is_finite() {
                return Err(ConvoyError::ValidationError("heading must be finite".to_string()));
            }
        }
        if let Some(speed) = report.speed {
            if !speed.is_finite() || speed < 0.0 {
                return Err(ConvoyError::ValidationError(
                    "speed must be a non-negative number".to_string(),
                ));
            }
        }

        let subscribers = self.hub.publish(ride_id, &report.driver_id, report.sample())?;
        Ok(PositionAck {
            ride_id: ride_id.to_string(),
            timestamp: report.timestamp,
            subscribers,
        })
    }

    pub fn subscribe(&self, ride_id: &str, rider_id: &str) -> Result<Subscription, ConvoyError> {
        if rider_id.trim().is_empty() {
            return Err(ConvoyError::ValidationError("rider_id must not be empty".to_string()));
        }
        self.hub.subscribe(ride_id, rider_id)
    }

    pub fn unsubscribe(&self, ride_id: &str, rider_id: &str) -> bool {
        self.hub.unsubscribe(ride_id, rider_id)
    }

    /// Latest route and ETA for a tracked ride, if one has been computed yet.
    pub fn current_route(&self, ride_id: &str) -> Result<Option<RouteUpdate>, ConvoyError> {
        self.hub.current_route(ride_id)
    }

    /// Get health status information for the service
    pub fn get_health_status(&self) -> HealthStatus {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let m = &self.metrics;

        let mut metrics = HashMap::new();
        metrics.insert("searches".to_string(), load(&m.searches));
        metrics.insert("sessions_started".to_string(), load(&m.sessions_started));
        metrics.insert("sessions_stopped".to_string(), load(&m.sessions_stopped));
        metrics.insert("positions_accepted".to_string(), load(&m.positions_accepted));
        metrics.insert("positions_rejected".to_string(), load(&m.positions_rejected));
        metrics.insert("routes_refreshed".to_string(), load(&m.routes_refreshed));
        metrics.insert("route_failures".to_string(), load(&m.route_failures));
        metrics.insert("subscriber_buffer".to_string(), self.config.subscriber_buffer as u64);

        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            active_sessions: self.hub.session_count(),
            metrics,
        }
    }
}
