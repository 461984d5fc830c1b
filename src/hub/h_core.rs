use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::hub::types::*;

/// In-memory hub of live ride sessions.
///
/// This implementation has the following characteristics:
/// - The ride map lock is held only to look up, insert or remove a session
/// - Each session has its own lock, so rides never wait on each other
/// - Fan-out to riders goes through bounded drop-oldest buffers and never blocks the driver
/// - Session changes are broadcast as [`HubEvent`]s to any observer
pub struct PositionHub {
    /// Live sessions keyed by ride id
    pub(super) sessions: Arc<RwLock<HashMap<String, Arc<RideSession>>>>,
    /// Channel for broadcasting hub events to observers
    pub(super) event_tx: broadcast::Sender<HubEvent>,
    /// Events buffered per subscriber
    pub(super) subscriber_buffer: usize,
}

impl Clone for PositionHub {
    fn clone(&self) -> Self {
        // Clones share the same sessions
        Self {
            sessions: self.sessions.clone(),
            event_tx: self.event_tx.clone(),
            subscriber_buffer: self.subscriber_buffer,
        }
    }
}

impl PositionHub {
    pub fn new(event_buffer: usize, subscriber_buffer: usize) -> Self {
        let (tx, _) = broadcast::channel(event_buffer.max(1));
        log::info!(
            "Creating PositionHub with subscriber_buffer: {}",
            subscriber_buffer
        );
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            event_tx: tx,
            subscriber_buffer: subscriber_buffer.max(1),
        }
    }

    /// Subscribe to hub events
    pub fn events(&self) -> broadcast::Receiver<HubEvent> {
        self.event_tx.subscribe()
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub(super) fn session(&self, ride_id: &str) -> Option<Arc<RideSession>> {
        self.sessions.read().get(ride_id).cloned()
    }

    pub(super) fn emit(&self, ride_id: &str, event_type: HubEventType) {
        // No receivers is fine
        let _ = self.event_tx.send(HubEvent {
            ride_id: ride_id.to_string(),
            event_type,
        });
    }
}
