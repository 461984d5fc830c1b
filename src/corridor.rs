//! Corridor matching of traveler requests against published ride offers.
//!
//! An offer is plausible for a request when its drop lies near the traveler's
//! drop and the traveler's pickup is either near the offer's start or inside the
//! corridor around the offer's straight pickup-drop line. Thresholds are fixed
//! policy; the bounding-box buffer is in raw degrees and is applied the same at
//! every latitude.

use crate::geometry::{distance_point_to_segment_km, haversine_distance_km};
use crate::models::{Coordinate, MatchQuery, RideOffer, RideOfferId};

/// Maximum distance between the traveler's drop and the offer's drop.
pub const MAX_DROP_DISTANCE_KM: f64 = 10.0;

/// Pickups this close to the offer's start are accepted without a corridor check.
pub const MAX_PICKUP_DISTANCE_KM: f64 = 10.0;

/// Buffer added on every side of the offer's bounding box, in degrees (~15 km).
pub const CORRIDOR_BOX_BUFFER_DEG: f64 = 0.15;

/// Maximum distance between the traveler's pickup and the offer's route line.
pub const MAX_CORRIDOR_DISTANCE_KM: f64 = 15.0;

/// Outcome of checking one offer against one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchVerdict {
    /// Pickup is close to where the ride starts
    NearPickup { pickup_km: f64 },
    /// Pickup is along the ride's route
    OnCorridor { corridor_km: f64 },
    /// The ride ends too far from the traveler's destination
    DropTooFar { drop_km: f64 },
    /// Pickup is outside the ride's buffered bounding box
    OutsideCorridorBox,
    /// Pickup is inside the box but too far from the route line
    OffCorridor { corridor_km: f64 },
}

impl MatchVerdict {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchVerdict::NearPickup { .. } | MatchVerdict::OnCorridor { .. })
    }
}

/// Axis-aligned box around an offer's endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorridorBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl CorridorBox {
    pub fn around(a: Coordinate, b: Coordinate, buffer_deg: f64) -> Self {
        Self {
            min_lat: a.lat.min(b.lat) - buffer_deg,
            max_lat: a.lat.max(b.lat) + buffer_deg,
            min_lon: a.lon.min(b.lon) - buffer_deg,
            max_lon: a.lon.max(b.lon) + buffer_deg,
        }
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&c.lat) && (self.min_lon..=self.max_lon).contains(&c.lon)
    }
}

/// Stateless matcher over a snapshot of candidate offers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorridorMatcher;

impl CorridorMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Decides whether `offer` plausibly serves `query`.
    pub fn assess(&self, query: &MatchQuery, offer: &RideOffer) -> MatchVerdict {
        let drop_km = haversine_distance_km(query.drop, offer.drop);
        if drop_km > MAX_DROP_DISTANCE_KM {
            return MatchVerdict::DropTooFar { drop_km };
        }

        let pickup_km = haversine_distance_km(query.pickup, offer.pickup);
        if pickup_km <= MAX_PICKUP_DISTANCE_KM {
            return MatchVerdict::NearPickup { pickup_km };
        }

        let corridor_box = CorridorBox::around(offer.pickup, offer.drop, CORRIDOR_BOX_BUFFER_DEG);
        if !corridor_box.contains(query.pickup) {
            return MatchVerdict::OutsideCorridorBox;
        }

        let corridor_km = distance_point_to_segment_km(query.pickup, offer.pickup, offer.drop);
        if corridor_km <= MAX_CORRIDOR_DISTANCE_KM {
            MatchVerdict::OnCorridor { corridor_km }
        } else {
            MatchVerdict::OffCorridor { corridor_km }
        }
    }

    /// Returns the ids of all plausible offers, in the order they were supplied.
    pub fn match_offers(&self, query: &MatchQuery, candidates: &[RideOffer]) -> Vec<RideOfferId> {
        candidates
            .iter()
            .filter(|offer| {
                let verdict = self.assess(query, offer);
                log::debug!("Offer {} verdict: {:?}", offer.id, verdict);
                verdict.is_match()
            })
            .map(|offer| offer.id.clone())
            .collect()
    }
}

/// Convenience wrapper around [`CorridorMatcher::match_offers`].
pub fn match_offers(query: &MatchQuery, candidates: &[RideOffer]) -> Vec<RideOfferId> {
    CorridorMatcher::new().match_offers(query, candidates)
}
