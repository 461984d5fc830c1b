//! API endpoints for the Convoy service.
//! Provides HTTP endpoints for ride search, ride lifecycle hooks, driver position
//! reports and rider live streams. Bodies are JSON; rider streams are
//! server-sent events.

use actix_web::web::Bytes;
use actix_web::{delete, get, post, web, HttpResponse, Responder, ResponseError};
use futures::StreamExt;
use serde_json::json;
use std::convert::Infallible;

use crate::models::{PositionReport, SearchRequest, SessionEvent, StatusUpdate};
use crate::service::TrackingService;

/// Search endpoint for travelers.
///
/// Accepts `{pickup, drop}` and returns the ids of published rides whose route
/// plausibly serves the trip, in offer order.
///
/// # Returns
/// - 200 OK with `{ride_ids, count}`
/// - 400 Bad Request if a coordinate is invalid
#[post("/rides/search")]
pub async fn search(
    request: web::Json<SearchRequest>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    match service.search(request.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => e.error_response(),
    }
}

/// Lifecycle hook called by the ride status authority on every transition.
///
/// # Returns
/// - 200 OK with the resulting tracking state
/// - 400 Bad Request if the destination or ids are invalid
#[post("/rides/{ride_id}/status")]
pub async fn update_status(
    path: web::Path<String>,
    request: web::Json<StatusUpdate>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    let ride_id = path.into_inner();
    match service.apply_status(&ride_id, request.into_inner()) {
        Ok(state) => HttpResponse::Ok().json(state),
        Err(e) => e.error_response(),
    }
}

/// Stops tracking a ride regardless of its status.
#[delete("/rides/{ride_id}/session")]
pub async fn stop_session(
    path: web::Path<String>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    let ride_id = path.into_inner();
    let stopped = service.stop_tracking(&ride_id);
    HttpResponse::Ok().json(json!({ "ride_id": ride_id, "stopped": stopped }))
}

/// Driver position report.
///
/// # Returns
/// - 200 OK with the number of riders reached
/// - 400 Bad Request for an invalid coordinate, heading or speed
/// - 403 Forbidden if the sender is not the ride's driver
/// - 404 Not Found if the ride is not being tracked
/// - 409 Conflict if the sample is not newer than the last accepted one
#[post("/rides/{ride_id}/positions")]
pub async fn publish_position(
    path: web::Path<String>,
    request: web::Json<PositionReport>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    let ride_id = path.into_inner();
    match service.publish_position(&ride_id, request.into_inner()) {
        Ok(ack) => HttpResponse::Ok().json(ack),
        Err(e) => e.error_response(),
    }
}

/// Live stream for a rider.
///
/// Emits `position`, `route` and a final `ended` event as server-sent events.
/// The last known position is sent first when there is one.
///
/// # Returns
/// - 200 OK with a `text/event-stream` body
/// - 404 Not Found if the ride is not being tracked
#[get("/rides/{ride_id}/stream/{rider_id}")]
pub async fn stream(
    path: web::Path<(String, String)>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    let (ride_id, rider_id) = path.into_inner();
    match service.subscribe(&ride_id, &rider_id) {
        Ok(subscription) => {
            let body = subscription
                .into_stream()
                .map(|event| Ok::<Bytes, Infallible>(Bytes::from(to_sse_frame(&event))));
            HttpResponse::Ok()
                .content_type("text/event-stream")
                .insert_header(("Cache-Control", "no-cache"))
                .streaming(body)
        }
        Err(e) => e.error_response(),
    }
}

/// Removes a rider from a ride's stream. Idempotent.
#[delete("/rides/{ride_id}/subscribers/{rider_id}")]
pub async fn unsubscribe(
    path: web::Path<(String, String)>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    let (ride_id, rider_id) = path.into_inner();
    let removed = service.unsubscribe(&ride_id, &rider_id);
    HttpResponse::Ok().json(json!({ "ride_id": ride_id, "rider_id": rider_id, "removed": removed }))
}

/// Current route and ETA snapshot.
///
/// # Returns
/// - 200 OK with the route, or `null` if none has been computed yet
/// - 404 Not Found if the ride is not being tracked
#[get("/rides/{ride_id}/route")]
pub async fn current_route(
    path: web::Path<String>,
    service: web::Data<TrackingService>,
) -> impl Responder {
    match service.current_route(&path.into_inner()) {
        Ok(route) => HttpResponse::Ok().json(route),
        Err(e) => e.error_response(),
    }
}

/// Health check endpoint
#[get("/health")]
pub async fn health(service: web::Data<TrackingService>) -> impl Responder {
    HttpResponse::Ok().json(service.get_health_status())
}

/// Formats one event as a server-sent events frame.
pub fn to_sse_frame(event: &SessionEvent) -> String {
    let data = match event {
        SessionEvent::Position(sample) => serde_json::to_string(sample),
        SessionEvent::Route(route) => serde_json::to_string(route),
        SessionEvent::Ended(reason) => serde_json::to_string(&json!({ "reason": reason })),
    }
    .unwrap_or_else(|_| "null".to_string());
    format!("event: {}\ndata: {}\n\n", event.kind(), data)
}
