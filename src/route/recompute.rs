use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::config::TrackingConfig;
use crate::error::ConvoyError;
use crate::geometry::{bearing_degrees, haversine_distance_km};
use crate::hub::{PositionHub, SessionFeed};
use crate::models::{PositionSample, RouteUpdate};
use crate::route::congestion::segment_route;
use crate::route::provider::{DirectionsProvider, DirectionsRequest, DirectionsRoute};

/// Route points closer than this to the driver are too noisy to take a heading from.
const MIN_HEADING_DISTANCE_KM: f64 = 0.01;

/// Keeps each tracked ride's route and ETA current as its driver moves.
///
/// One task runs per session. It watches the session's latest position, waits a
/// short debounce so bursts of samples cost a single provider call, and
/// publishes the result back through the hub. Provider failures leave the
/// previous route in place and are retried later.
#[derive(Clone)]
pub struct Recomputer {
    hub: PositionHub,
    provider: Arc<dyn DirectionsProvider>,
    debounce: Duration,
    retry: Duration,
    retry_jitter_ms: u64,
    provider_timeout: Duration,
}

impl Recomputer {
    pub fn new(hub: PositionHub, provider: Arc<dyn DirectionsProvider>, config: &TrackingConfig) -> Self {
        Self {
            hub,
            provider,
            debounce: Duration::from_millis(config.recompute_debounce_ms),
            retry: Duration::from_millis(config.provider_retry_ms),
            retry_jitter_ms: config.provider_retry_jitter_ms,
            provider_timeout: Duration::from_millis(config.provider_timeout_ms),
        }
    }

    /// Starts following a ride's session. The task ends when the session stops.
    pub fn spawn(&self, ride_id: &str) -> Result<JoinHandle<()>, ConvoyError> {
        let feed = self.hub.feed(ride_id)?;
        let recomputer = self.clone();
        log::info!("Starting route recomputer for ride {}", ride_id);
        Ok(tokio::spawn(async move { recomputer.run(feed).await }))
    }

    /// Requests a route from `sample` to the feed's destination and publishes
    /// it into the feed's session.
    ///
    /// On provider failure or time-out nothing is published and the ride keeps
    /// its previous route. Fails with `NoActiveSession` once the session the
    /// feed belongs to has ended, even if the ride was restarted since.
    pub async fn refresh(
        &self,
        feed: &SessionFeed,
        sample: &PositionSample,
    ) -> Result<RouteUpdate, ConvoyError> {
        let ride_id = feed.ride_id.as_str();
        let request = DirectionsRequest::live(sample.coordinate, feed.destination);
        let outcome = match tokio::time::timeout(self.provider_timeout, self.provider.route(&request)).await {
            Ok(result) => result.map_err(ConvoyError::from),
            Err(_elapsed) => Err(ConvoyError::ProviderUnavailable(format!(
                "no response within {}ms",
                self.provider_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(route) => {
                let update = build_route_update(sample, route, now_ms());
                let riders = self.hub.publish_route(ride_id, &feed.session_id, update.clone())?;
                log::info!(
                    "Refreshed route for ride {}: {:.0}m remaining, eta {} ({} riders)",
                    ride_id, update.remaining_distance_m, update.eta, riders
                );
                Ok(update)
            }
            Err(err) => {
                log::warn!("Route refresh failed for ride {}: {}", ride_id, err);
                self.hub.report_route_failure(ride_id, &err.to_string());
                Err(err)
            }
        }
    }

    async fn run(self, mut feed: SessionFeed) {
        // A position may already have been accepted before the feed was handed out
        let mut pending = feed.positions.borrow_and_update().clone();

        loop {
            if pending.is_none() {
                if feed.positions.changed().await.is_err() {
                    break;
                }
                pending = feed.positions.borrow_and_update().clone();
                continue;
            }

            if !self.debounce.is_zero() {
                tokio::time::sleep(self.debounce).await;
            }
            // Whatever arrived during the debounce supersedes the pending sample
            let latest = feed.positions.borrow_and_update().clone();
            let Some(sample) = latest.or_else(|| pending.take()) else {
                continue;
            };
            pending = None;

            match self.refresh(&feed, &sample).await {
                Ok(_) => {}
                Err(ConvoyError::NoActiveSession(_)) => break,
                Err(_) => {
                    let delay = self.retry_delay();
                    tokio::select! {
                        changed = feed.positions.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            pending = feed.positions.borrow_and_update().clone();
                        }
                        _ = tokio::time::sleep(delay) => {
                            pending = Some(sample);
                        }
                    }
                }
            }
        }

        log::info!("Route recomputer for ride {} finished", feed.ride_id);
    }

    fn retry_delay(&self) -> Duration {
        let jitter = if self.retry_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.retry_jitter_ms)
        } else {
            0
        };
        self.retry + Duration::from_millis(jitter)
    }
}

/// Turns a provider route into the update riders receive.
pub fn build_route_update(sample: &PositionSample, route: DirectionsRoute, computed_at: i64) -> RouteUpdate {
    let segments = segment_route(&route.geometry, route.congestion.as_deref());
    let heading = route
        .geometry
        .iter()
        .find(|point| haversine_distance_km(sample.coordinate, **point) >= MIN_HEADING_DISTANCE_KM)
        .map(|point| bearing_degrees(sample.coordinate, *point))
        .or(sample.heading)
        .unwrap_or(0.0);

    RouteUpdate {
        eta: computed_at + (route.duration_s * 1000.0).round() as i64,
        remaining_distance_m: route.distance_m,
        duration_s: route.duration_s,
        segments,
        heading,
        based_on: sample.timestamp,
        computed_at,
        geometry: route.geometry,
    }
}

/// Current time as unix milliseconds.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
