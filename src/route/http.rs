use reqwest::{Client, Url};
use std::time::Duration;

use crate::config::TrackingConfig;
use crate::error::ConvoyError;
use crate::models::Coordinate;
use crate::route::provider::{DirectionsProvider, DirectionsRequest, DirectionsRoute, ProviderError};

/// Thin HTTP client for a Mapbox-compatible directions API.
#[derive(Debug, Clone)]
pub struct HttpDirectionsProvider {
    client: Client,
    base_url: String,
    profile: String,
    access_token: Option<String>,
}

impl HttpDirectionsProvider {
    pub fn new(
        base_url: &str,
        profile: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConvoyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConvoyError::Internal(format!("failed to build directions client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.trim_matches('/').to_string(),
            access_token,
        })
    }

    pub fn from_config(config: &TrackingConfig) -> Result<Self, ConvoyError> {
        Self::new(
            &config.directions_base_url,
            &config.directions_profile,
            config.directions_access_token.clone(),
            Duration::from_millis(config.provider_timeout_ms),
        )
    }

    pub(crate) fn request_url(&self, request: &DirectionsRequest) -> Result<Url, ProviderError> {
        let coords = format!(
            "{:.6},{:.6};{:.6},{:.6}",
            request.origin.lon, request.origin.lat, request.destination.lon, request.destination.lat
        );
        let base = format!("{}/directions/v5/{}/{}", self.base_url, self.profile, coords);
        let mut url = Url::parse(&base)
            .map_err(|err| ProviderError::Decode(format!("failed to build directions URL: {}", err)))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("alternatives", if request.alternatives { "true" } else { "false" })
                .append_pair("geometries", "geojson")
                .append_pair("overview", "full");
            if request.annotate_congestion {
                query.append_pair("annotations", "congestion,distance,duration");
            }
            if let Some(token) = &self.access_token {
                query.append_pair("access_token", token);
            }
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl DirectionsProvider for HttpDirectionsProvider {
    async fn route(&self, request: &DirectionsRequest) -> Result<DirectionsRoute, ProviderError> {
        let url = self.request_url(request)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let parsed: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))?;
        parse_directions_response(parsed)
    }
}

#[derive(serde::Deserialize)]
pub(crate) struct DirectionsResponse {
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) routes: Vec<ApiRoute>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ApiRoute {
    pub(crate) distance: f64,
    pub(crate) duration: f64,
    pub(crate) geometry: ApiGeometry,
    #[serde(default)]
    pub(crate) legs: Vec<ApiLeg>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ApiGeometry {
    /// GeoJSON order: `[lon, lat]`
    pub(crate) coordinates: Vec<[f64; 2]>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ApiLeg {
    pub(crate) annotation: Option<ApiAnnotation>,
}

#[derive(serde::Deserialize)]
pub(crate) struct ApiAnnotation {
    pub(crate) congestion: Option<Vec<String>>,
}

/// Takes the first route of a directions response.
pub(crate) fn parse_directions_response(response: DirectionsResponse) -> Result<DirectionsRoute, ProviderError> {
    if response.code != "Ok" {
        return Err(ProviderError::NoRoute(response.code));
    }
    let route = response
        .routes
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::NoRoute("empty routes".to_string()))?;

    let geometry: Vec<Coordinate> = route
        .geometry
        .coordinates
        .iter()
        .map(|[lon, lat]| Coordinate::new(*lat, *lon))
        .collect();
    if geometry.is_empty() {
        return Err(ProviderError::Decode("route has no geometry".to_string()));
    }

    // Congestion is per leg; a live route has a single leg but join them anyway.
    let mut congestion: Option<Vec<String>> = None;
    for leg in route.legs {
        if let Some(labels) = leg.annotation.and_then(|a| a.congestion) {
            congestion.get_or_insert_with(Vec::new).extend(labels);
        }
    }

    Ok(DirectionsRoute {
        geometry,
        distance_m: route.distance,
        duration_s: route.duration,
        congestion,
    })
}
