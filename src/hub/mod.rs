// Live position fan-out, one session per tracked ride
mod types;
mod subscriber;
mod h_core;
mod h_impl;

pub use types::{HubEvent, HubEventType, SessionFeed, SessionSnapshot};
pub use subscriber::Subscription;
pub use h_core::PositionHub;

/// Default capacity of the hub event channel
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Default number of events buffered per subscriber
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

impl Default for PositionHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER, DEFAULT_SUBSCRIBER_BUFFER)
    }
}
