//! Configuration management for the Convoy service.
//!
//! This module provides configuration handling via environment variables with sensible defaults.
//! All configuration parameters can be customized through environment variables with the CONVOY_ prefix.
//!
//! # Environment Variables
//! - CONVOY_SUBSCRIBER_BUFFER: Events buffered per rider before dropping the oldest (default: 64)
//! - CONVOY_HUB_EVENT_BUFFER: Capacity of the hub's internal event channel (default: 256)
//! - CONVOY_RECOMPUTE_DEBOUNCE_MS: Delay before asking for a new route (default: 250)
//! - CONVOY_PROVIDER_RETRY_MS: Delay before retrying a failed route request (default: 5000)
//! - CONVOY_PROVIDER_RETRY_JITTER_MS: Random extra retry delay (default: 500)
//! - CONVOY_PROVIDER_TIMEOUT_MS: HTTP timeout for the directions provider (default: 3000)
//! - CONVOY_DIRECTIONS_BASE_URL: Directions API base URL (default: https://api.mapbox.com)
//! - CONVOY_DIRECTIONS_PROFILE: Routing profile (default: mapbox/driving-traffic)
//! - CONVOY_DIRECTIONS_ACCESS_TOKEN: Access token for the directions API (optional)
//! - CONVOY_TRACK_APPROACH_PHASES: Track while the driver approaches the pickup (default: true)
//! - CONVOY_OFFERS_FILE: JSON file with ride offers loaded at startup (optional)

use serde::Deserialize;
use std::env;

/// Prefix for all Convoy service environment variables.
const ENV_PREFIX: &str = "CONVOY_";

/// Configuration parameters for live tracking and route recomputation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Events buffered per subscriber. When full, the oldest event is dropped.
    pub subscriber_buffer: usize,

    /// Capacity of the broadcast channel carrying hub events to observers.
    pub hub_event_buffer: usize,

    /// Wait after a position arrives before requesting a route, so bursts coalesce.
    /// Specified in milliseconds.
    pub recompute_debounce_ms: u64,

    /// Wait before retrying after a directions provider failure.
    /// Specified in milliseconds.
    pub provider_retry_ms: u64,

    /// Upper bound of the random delay added to each retry.
    pub provider_retry_jitter_ms: u64,

    /// HTTP timeout for a single directions request. Specified in milliseconds.
    pub provider_timeout_ms: u64,

    pub directions_base_url: String,

    pub directions_profile: String,

    pub directions_access_token: Option<String>,

    /// Whether `driver_on_way` and `driver_arrived` are tracked in addition to `trip_started`.
    pub track_approach_phases: bool,

    /// Optional JSON file of ride offers used to seed the in-memory offer source.
    pub offers_file: Option<String>,
}

impl TrackingConfig {
    /// Attempts to load configuration from environment variables.
    ///
    /// Variables that are not set keep their default value.
    ///
    /// # Returns
    /// - Ok(config) if all present variables are valid
    /// - Err(message) if any variable fails to parse or validation fails
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists for local development
        dotenv::dotenv().ok();

        let env_vars: std::collections::HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .map(|(k, v)| (k.trim_start_matches(ENV_PREFIX).to_string(), v))
            .collect();

        match envy::from_iter::<_, Self>(env_vars) {
            Ok(config) => {
                config.validate()?;
                Ok(config)
            }
            Err(e) => Err(format!("Failed to parse environment variables: {}", e)),
        }
    }

    /// Loads configuration from environment variables, falling back to defaults
    /// if they are invalid.
    pub fn from_env_or_default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            log::warn!("{}; using default configuration", e);
            Self::default()
        })
    }

    /// Validates all configuration parameters.
    ///
    /// # Returns
    /// - Ok(()) if all validation passes
    /// - Err(message) with description of the first validation failure
    pub fn validate(&self) -> Result<(), String> {
        if self.subscriber_buffer == 0 {
            return Err("subscriber_buffer must be positive".to_string());
        }
        if self.hub_event_buffer == 0 {
            return Err("hub_event_buffer must be positive".to_string());
        }
        if self.provider_retry_ms == 0 {
            return Err("provider_retry_ms must be positive".to_string());
        }
        if self.provider_timeout_ms == 0 {
            return Err("provider_timeout_ms must be positive".to_string());
        }
        if self.directions_base_url.trim().is_empty() {
            return Err("directions_base_url must not be empty".to_string());
        }
        if self.directions_profile.trim().is_empty() {
            return Err("directions_profile must not be empty".to_string());
        }
        Ok(())
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
            hub_event_buffer: 256,
            recompute_debounce_ms: 250,
            provider_retry_ms: 5000,
            provider_retry_jitter_ms: 500,
            provider_timeout_ms: 3000,
            directions_base_url: "https://api.mapbox.com".to_string(),
            directions_profile: "mapbox/driving-traffic".to_string(),
            directions_access_token: None,
            track_approach_phases: true,
            offers_file: None,
        }
    }
}
