//! Candidate offer source consumed by the corridor matcher.
//!
//! The persistence layer owns ride offers. The matcher only ever sees a
//! point-in-time snapshot of the offers that are published and not in the past.

use parking_lot::RwLock;
use std::sync::Arc;
use time::Date;

use crate::error::ConvoyError;
use crate::models::{OfferStatus, RideOffer};

/// Supplies snapshots of matchable ride offers.
///
/// Implementations must only return offers with `status == Published` and
/// `ride_date >= today`.
#[async_trait::async_trait]
pub trait CandidateOfferSource: Send + Sync + 'static {
    async fn published_offers(&self, today: Date) -> Result<Vec<RideOffer>, ConvoyError>;
}

/// In-memory offer source, kept in publication order.
#[derive(Clone, Default)]
pub struct InMemoryOfferSource {
    offers: Arc<RwLock<Vec<RideOffer>>>,
}

impl InMemoryOfferSource {
    pub fn new(offers: Vec<RideOffer>) -> Self {
        Self {
            offers: Arc::new(RwLock::new(offers)),
        }
    }

    /// Loads offers from a JSON array on disk.
    pub fn from_json_file(path: &str) -> Result<Self, ConvoyError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConvoyError::Internal(format!("failed to read offers file {}: {}", path, e)))?;
        let offers: Vec<RideOffer> = serde_json::from_str(&raw)
            .map_err(|e| ConvoyError::ValidationError(format!("invalid offers file {}: {}", path, e)))?;
        for offer in &offers {
            offer.pickup.validate()?;
            offer.drop.validate()?;
        }
        log::info!("Loaded {} ride offers from {}", offers.len(), path);
        Ok(Self::new(offers))
    }

    /// Inserts an offer, or replaces the one with the same id in place.
    pub fn upsert(&self, offer: RideOffer) {
        let mut offers = self.offers.write();
        match offers.iter_mut().find(|o| o.id == offer.id) {
            Some(existing) => *existing = offer,
            None => offers.push(offer),
        }
    }

    pub fn remove(&self, offer_id: &str) -> Option<RideOffer> {
        let mut offers = self.offers.write();
        let index = offers.iter().position(|o| o.id == offer_id)?;
        Some(offers.remove(index))
    }

    pub fn len(&self) -> usize {
        self.offers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.read().is_empty()
    }
}

#[async_trait::async_trait]
impl CandidateOfferSource for InMemoryOfferSource {
    async fn published_offers(&self, today: Date) -> Result<Vec<RideOffer>, ConvoyError> {
        Ok(self
            .offers
            .read()
            .iter()
            .filter(|o| o.status == OfferStatus::Published && o.ride_date >= today)
            .cloned()
            .collect())
    }
}
