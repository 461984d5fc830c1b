use actix_web::{test, web, App};
use serde_json::json;

use convoy::api;
use convoy::models::{Coordinate, SearchRequest};

use crate::common::{offer, service_with, StaticProvider, AIRPORT, ORIGIN};

macro_rules! app {
    ($service:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($service))
                .service(api::search)
                .service(api::update_status)
                .service(api::stop_session)
                .service(api::publish_position)
                .service(api::stream)
                .service(api::unsubscribe)
                .service(api::current_route)
                .service(api::health),
        )
        .await
    };
}

fn start_body() -> serde_json::Value {
    json!({
        "status": "trip_started",
        "driver_id": "driver-1",
        "destination": { "lat": AIRPORT.lat, "lon": AIRPORT.lon }
    })
}

fn position_body(driver_id: &str, timestamp: i64) -> serde_json::Value {
    json!({
        "driver_id": driver_id,
        "coordinate": { "lat": ORIGIN.lat, "lon": ORIGIN.lon },
        "timestamp": timestamp,
        "heading": 12.0
    })
}

#[actix_web::test]
async fn test_search_endpoint() {
    let pickup = Coordinate::new(12.90, 77.50);
    let drop = Coordinate::new(13.00, 77.60);
    let service = service_with(vec![offer("ride-7", pickup, drop, 0)], StaticProvider::new());
    let app = app!(service);

    let req = test::TestRequest::post()
        .uri("/rides/search")
        .set_json(SearchRequest {
            pickup: Coordinate::new(12.95, 77.55),
            drop,
        });
    let resp = test::call_service(&app, req.to_request()).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["ride_ids"], json!(["ride-7"]));
    assert_eq!(body["count"], 1);
}

#[actix_web::test]
async fn test_search_rejects_bad_coordinates() {
    let app = app!(service_with(Vec::new(), StaticProvider::new()));

    let req = test::TestRequest::post().uri("/rides/search").set_json(json!({
        "pickup": { "lat": 12.9, "lon": 200.0 },
        "drop": { "lat": 13.0, "lon": 77.6 }
    }));
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status().as_u16(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_coordinate");
}

#[actix_web::test]
async fn test_position_flow_status_codes() {
    let app = app!(service_with(Vec::new(), StaticProvider::failing()));

    // No session yet
    let req = test::TestRequest::post()
        .uri("/rides/ride-1/positions")
        .set_json(position_body("driver-1", 1));
    assert_eq!(test::call_service(&app, req.to_request()).await.status().as_u16(), 404);

    let req = test::TestRequest::post().uri("/rides/ride-1/status").set_json(start_body());
    let resp = test::call_service(&app, req.to_request()).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["tracking"], true);

    let req = test::TestRequest::post()
        .uri("/rides/ride-1/positions")
        .set_json(position_body("driver-1", 100));
    assert!(test::call_service(&app, req.to_request()).await.status().is_success());

    let req = test::TestRequest::post()
        .uri("/rides/ride-1/positions")
        .set_json(position_body("driver-1", 100));
    assert_eq!(test::call_service(&app, req.to_request()).await.status().as_u16(), 409);

    let req = test::TestRequest::post()
        .uri("/rides/ride-1/positions")
        .set_json(position_body("driver-2", 200));
    assert_eq!(test::call_service(&app, req.to_request()).await.status().as_u16(), 403);

    // The provider is down, so there is no route yet but the ride is tracked
    let req = test::TestRequest::get().uri("/rides/ride-1/route");
    let resp = test::call_service(&app, req.to_request()).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body.is_null());

    let req = test::TestRequest::delete().uri("/rides/ride-1/session");
    assert!(test::call_service(&app, req.to_request()).await.status().is_success());

    let req = test::TestRequest::get().uri("/rides/ride-1/route");
    assert_eq!(test::call_service(&app, req.to_request()).await.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_stream_delivers_last_position_and_end() {
    let service = service_with(Vec::new(), StaticProvider::failing());
    let app = app!(service.clone());

    let req = test::TestRequest::post().uri("/rides/ride-1/status").set_json(start_body());
    test::call_service(&app, req.to_request()).await;
    let req = test::TestRequest::post()
        .uri("/rides/ride-1/positions")
        .set_json(position_body("driver-1", 100));
    test::call_service(&app, req.to_request()).await;

    let req = test::TestRequest::get().uri("/rides/ride-1/stream/rider-1");
    let resp = test::call_service(&app, req.to_request()).await;
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "text/event-stream"
    );

    service.stop_tracking("ride-1");

    let body = test::read_body(resp).await;
    let text = std::str::from_utf8(&body).unwrap();
    let position_at = text.find("event: position").expect("missing position event");
    let ended_at = text.find("event: ended").expect("missing end event");
    assert!(position_at < ended_at);
    assert!(text.contains("\"timestamp\":100"));
    assert!(text.contains("session_stopped"));
}

#[actix_web::test]
async fn test_stream_without_session_is_not_found() {
    let app = app!(service_with(Vec::new(), StaticProvider::new()));
    let req = test::TestRequest::get().uri("/rides/nope/stream/rider-1");
    let resp = test::call_service(&app, req.to_request()).await;
    assert_eq!(resp.status().as_u16(), 404);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "no_active_session");
}

#[actix_web::test]
async fn test_unsubscribe_is_idempotent() {
    let service = service_with(Vec::new(), StaticProvider::failing());
    let app = app!(service.clone());

    let req = test::TestRequest::post().uri("/rides/ride-1/status").set_json(start_body());
    test::call_service(&app, req.to_request()).await;
    let _sub = service.subscribe("ride-1", "rider-1").unwrap();

    for expected in [true, false] {
        let req = test::TestRequest::delete().uri("/rides/ride-1/subscribers/rider-1");
        let body: serde_json::Value = test::call_and_read_body_json(&app, req.to_request()).await;
        assert_eq!(body["removed"], expected);
    }
}

#[actix_web::test]
async fn test_health_endpoint() {
    let app = app!(service_with(Vec::new(), StaticProvider::new()));
    let req = test::TestRequest::get().uri("/health");
    let body: serde_json::Value = test::call_and_read_body_json(&app, req.to_request()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);
}
