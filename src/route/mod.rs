// Route and ETA recomputation against an external directions provider
mod provider;
mod http;
mod congestion;
mod recompute;

pub use provider::{DirectionsProvider, DirectionsRequest, DirectionsRoute, ProviderError};
pub use http::HttpDirectionsProvider;
pub use congestion::{classify, segment_route};
pub use recompute::{build_route_update, now_ms, Recomputer};
