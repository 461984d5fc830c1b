use std::sync::Arc;
use std::time::Duration;

use convoy::config::TrackingConfig;
use convoy::error::ConvoyError;
use convoy::lifecycle::RideStatus;
use convoy::models::{
    Coordinate, EndReason, OfferStatus, PositionReport, SearchRequest, SessionEvent, StatusUpdate,
};
use convoy::offers::InMemoryOfferSource;
use convoy::service::TrackingService;

use crate::common::{eventually, fast_config, offer, service_with, StaticProvider, AIRPORT, ORIGIN};

fn status(status: RideStatus) -> StatusUpdate {
    StatusUpdate {
        status,
        driver_id: "driver-1".to_string(),
        destination: AIRPORT,
    }
}

fn report(driver_id: &str, coordinate: Coordinate, timestamp: i64) -> PositionReport {
    PositionReport {
        driver_id: driver_id.to_string(),
        coordinate,
        timestamp,
        heading: Some(30.0),
        speed: Some(8.5),
    }
}

#[tokio::test]
async fn search_returns_plausible_published_offers_in_order() {
    let pickup = Coordinate::new(12.90, 77.50);
    let drop = Coordinate::new(13.00, 77.60);

    let mut cancelled = offer("cancelled", pickup, drop, 1);
    cancelled.status = OfferStatus::Cancelled;
    let offers = vec![
        offer("tomorrow", pickup, drop, 1),
        offer("past", pickup, drop, -1),
        cancelled,
        offer("elsewhere", pickup, Coordinate::new(13.5, 78.2), 0),
        offer("today", pickup, drop, 0),
    ];
    let service = service_with(offers, StaticProvider::new());

    let response = service
        .search(SearchRequest {
            pickup: Coordinate::new(12.95, 77.55),
            drop,
        })
        .await
        .unwrap();

    assert_eq!(response.ride_ids, vec!["tomorrow", "today"]);
    assert_eq!(response.count, 2);
}

#[tokio::test]
async fn search_rejects_invalid_coordinates() {
    let service = service_with(Vec::new(), StaticProvider::new());
    let result = service
        .search(SearchRequest {
            pickup: Coordinate::new(91.0, 77.5),
            drop: ORIGIN,
        })
        .await;
    assert!(matches!(result, Err(ConvoyError::InvalidCoordinate(_))));
}

#[tokio::test]
async fn lifecycle_drives_tracking() {
    let service = service_with(Vec::new(), StaticProvider::new());

    let state = service.apply_status("ride-1", status(RideStatus::Confirmed)).unwrap();
    assert!(!state.tracking);
    assert!(!service.hub().has_session("ride-1"));

    let state = service.apply_status("ride-1", status(RideStatus::DriverOnWay)).unwrap();
    assert!(state.tracking);
    assert!(!state.already_tracking);

    let mut rider = service.subscribe("ride-1", "rider-1").unwrap();

    let state = service.apply_status("ride-1", status(RideStatus::TripStarted)).unwrap();
    assert!(state.tracking);
    assert!(state.already_tracking);

    let state = service.apply_status("ride-1", status(RideStatus::Completed)).unwrap();
    assert!(!state.tracking);
    assert!(state.already_tracking);
    assert!(!service.hub().has_session("ride-1"));

    let ended = tokio::time::timeout(Duration::from_secs(1), rider.recv()).await.unwrap();
    assert_eq!(ended, Some(SessionEvent::Ended(EndReason::SessionStopped)));
}

#[tokio::test]
async fn approach_phases_can_be_excluded() {
    let config = TrackingConfig {
        track_approach_phases: false,
        ..fast_config()
    };
    let service = TrackingService::new(
        Some(config),
        Arc::new(InMemoryOfferSource::default()),
        StaticProvider::new(),
    );

    let state = service.apply_status("ride-1", status(RideStatus::DriverArrived)).unwrap();
    assert!(!state.tracking);
    assert!(!service.hub().has_session("ride-1"));

    let state = service.apply_status("ride-1", status(RideStatus::TripStarted)).unwrap();
    assert!(state.tracking);
}

#[tokio::test]
async fn only_the_rides_driver_may_publish() {
    let service = service_with(Vec::new(), StaticProvider::new());
    service.apply_status("ride-1", status(RideStatus::TripStarted)).unwrap();

    let result = service.publish_position("ride-1", report("intruder", ORIGIN, 1));
    assert!(matches!(result, Err(ConvoyError::DriverMismatch { .. })));

    let ack = service.publish_position("ride-1", report("driver-1", ORIGIN, 1)).unwrap();
    assert_eq!(ack.timestamp, 1);
    assert_eq!(ack.subscribers, 0);
}

#[tokio::test]
async fn invalid_reports_never_reach_the_hub() {
    let service = service_with(Vec::new(), StaticProvider::new());
    service.apply_status("ride-1", status(RideStatus::TripStarted)).unwrap();

    let result = service.publish_position("ride-1", report("driver-1", Coordinate::new(12.0, 181.0), 1));
    assert!(matches!(result, Err(ConvoyError::InvalidCoordinate(_))));

    let mut negative_speed = report("driver-1", ORIGIN, 1);
    negative_speed.speed = Some(-1.0);
    assert!(matches!(
        service.publish_position("ride-1", negative_speed),
        Err(ConvoyError::ValidationError(_))
    ));

    assert_eq!(service.hub().last_position("ride-1").unwrap(), None);
}

#[tokio::test]
async fn invalid_destination_is_rejected() {
    let service = service_with(Vec::new(), StaticProvider::new());
    let mut update = status(RideStatus::TripStarted);
    update.destination = Coordinate::new(f64::NAN, 0.0);
    assert!(matches!(
        service.apply_status("ride-1", update),
        Err(ConvoyError::InvalidCoordinate(_))
    ));
    assert!(!service.hub().has_session("ride-1"));
}

#[tokio::test]
async fn route_is_recomputed_and_counted() {
    let provider = StaticProvider::new();
    let service = service_with(Vec::new(), provider.clone());
    service.apply_status("ride-1", status(RideStatus::TripStarted)).unwrap();
    service.publish_position("ride-1", report("driver-1", ORIGIN, 10)).unwrap();

    assert!(eventually(|| service.current_route("ride-1").unwrap().is_some()).await);
    assert!(eventually(|| service.get_health_status().metrics["routes_refreshed"] >= 1).await);

    let health = service.get_health_status();
    assert_eq!(health.status, "ok");
    assert_eq!(health.active_sessions, 1);
    assert_eq!(health.metrics["positions_accepted"], 1);
    assert_eq!(health.metrics["sessions_started"], 1);
}
