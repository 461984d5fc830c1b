use thiserror::Error;

use crate::error::ConvoyError;
use crate::models::Coordinate;

/// Route request sent to a directions provider.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionsRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// Live tracking only needs the fastest path
    pub alternatives: bool,
    /// Ask for per-segment congestion labels when the provider has them
    pub annotate_congestion: bool,
}

impl DirectionsRequest {
    /// The request shape used while tracking a ride.
    pub fn live(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            origin,
            destination,
            alternatives: false,
            annotate_congestion: true,
        }
    }
}

/// Route returned by a directions provider.
#[derive(Clone, Debug, PartialEq)]
pub struct DirectionsRoute {
    /// Route polyline from origin to destination
    pub geometry: Vec<Coordinate>,
    pub distance_m: f64,
    pub duration_s: f64,
    /// One label per geometry segment (`geometry.len() - 1` entries), if annotated
    pub congestion: Option<Vec<String>>,
}

/// Errors encountered while requesting a route.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(u16),

    #[error("invalid provider response: {0}")]
    Decode(String),

    #[error("no route found ({0})")]
    NoRoute(String),
}

impl From<ProviderError> for ConvoyError {
    fn from(err: ProviderError) -> Self {
        ConvoyError::ProviderUnavailable(err.to_string())
    }
}

/// External routing service. Failures are treated as transient.
#[async_trait::async_trait]
pub trait DirectionsProvider: Send + Sync + 'static {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsRoute, ProviderError>;
}
