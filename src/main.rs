//! Main entry point for the Convoy service.
//! Sets up the HTTP server, configures logging, and initializes the service with
//! environment-based configuration.

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use convoy::api;
use convoy::config::TrackingConfig;
use convoy::offers::InMemoryOfferSource;
use convoy::route::HttpDirectionsProvider;
use convoy::service::TrackingService;

/// Main entry point for the Convoy service.
///
/// # Server Configuration
/// - Binds to 0.0.0.0 on $PORT (default 8080)
/// - Ride endpoints live under /rides, health under /health and /convoy/health
///
/// # Environment Variables
/// See [`convoy::config`] for the CONVOY_* variables. Log level is set via RUST_LOG.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = TrackingConfig::from_env_or_default();
    log::info!("Starting Convoy service with configuration: {:?}", config);

    let offers = match &config.offers_file {
        Some(path) => InMemoryOfferSource::from_json_file(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?,
        None => InMemoryOfferSource::default(),
    };
    let provider = HttpDirectionsProvider::from_config(&config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let service = web::Data::new(TrackingService::new(
        Some(config),
        Arc::new(offers),
        Arc::new(provider),
    ));

    let port = match std::env::var("PORT") {
        Ok(raw) => raw.parse::<u16>().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "PORT environment variable must be a valid port number",
            )
        })?,
        Err(_) => 8080,
    };
    log::info!("Starting server on port {}", port);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(service.clone())
            .service(api::search)
            .service(api::update_status)
            .service(api::stop_session)
            .service(api::publish_position)
            .service(api::stream)
            .service(api::unsubscribe)
            .service(api::current_route)
            .service(api::health)
            .service(web::scope("/convoy").service(api::health))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
