#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use convoy::config::TrackingConfig;
use convoy::models::{Coordinate, OfferStatus, PositionSample, RideOffer};
use convoy::offers::InMemoryOfferSource;
use convoy::route::{DirectionsProvider, DirectionsRequest, DirectionsRoute, ProviderError};
use convoy::service::TrackingService;
use time::OffsetDateTime;

/// MG Road, Bengaluru
pub const ORIGIN: Coordinate = Coordinate::new(12.9716, 77.5946);
/// Kempegowda airport
pub const AIRPORT: Coordinate = Coordinate::new(13.1989, 77.7068);

/// Returns a coordinate `meters` away from `from` towards the northeast.
pub fn northeast_of(from: Coordinate, meters: f64) -> Coordinate {
    let step_deg = meters / 111_195.0 * std::f64::consts::FRAC_1_SQRT_2;
    Coordinate::new(
        from.lat + step_deg,
        from.lon + step_deg / from.lat.to_radians().cos(),
    )
}

pub fn sample(coordinate: Coordinate, timestamp: i64) -> PositionSample {
    PositionSample {
        coordinate,
        timestamp,
        heading: None,
        speed: None,
    }
}

pub fn offer(id: &str, pickup: Coordinate, drop: Coordinate, days_ahead: i64) -> RideOffer {
    RideOffer {
        id: id.to_string(),
        driver_id: format!("driver-{}", id),
        pickup,
        drop,
        seats_available: 3,
        price_per_seat: 20_000,
        ride_date: OffsetDateTime::now_utc().date() + time::Duration::days(days_ahead),
        status: OfferStatus::Published,
    }
}

/// Configuration with short timings for tests.
pub fn fast_config() -> TrackingConfig {
    TrackingConfig {
        recompute_debounce_ms: 0,
        provider_retry_ms: 50,
        provider_retry_jitter_ms: 0,
        provider_timeout_ms: 1_000,
        ..TrackingConfig::default()
    }
}

/// Directions provider returning a fixed route through the midpoint, or failing
/// or stalling on demand.
pub struct StaticProvider {
    failing: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
    duration_s: f64,
}

impl StaticProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failing: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            duration_s: 600.0,
        })
    }

    pub fn failing() -> Arc<Self> {
        let provider = Self::new();
        provider.set_failing(true);
        provider
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes every following call wait this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        let provider = Self::new();
        provider.set_delay(delay);
        provider
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }
}

#[async_trait::async_trait]
impl DirectionsProvider for StaticProvider {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsRoute, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Status(503));
        }
        let midpoint = Coordinate::new(
            (request.origin.lat + request.destination.lat) / 2.0,
            (request.origin.lon + request.destination.lon) / 2.0,
        );
        Ok(DirectionsRoute {
            geometry: vec![request.origin, midpoint, request.destination],
            distance_m: 12_000.0,
            duration_s: self.duration_s,
            congestion: Some(vec!["low".to_string(), "heavy".to_string()]),
        })
    }
}

pub fn service_with(offers: Vec<RideOffer>, provider: Arc<StaticProvider>) -> TrackingService {
    TrackingService::new(
        Some(fast_config()),
        Arc::new(InMemoryOfferSource::new(offers)),
        provider,
    )
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
