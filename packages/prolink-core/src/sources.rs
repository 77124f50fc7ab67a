//! Trait abstractions for the upstream packet sources.
//!
//! The UDP announcement listener and the status listener own the network
//! sockets; the finder only consumes their decoded output. Depending on
//! these traits keeps the finder a constructed value with injected
//! dependencies, and lets tests drive it with hand-built packets.

use tokio::sync::broadcast;

use crate::refs::DeviceId;
use crate::status::CdjStatus;

/// A source of decoded status packets.
pub trait StatusSource: Send + Sync {
    /// Subscribes to the stream of status updates.
    ///
    /// Each subscriber gets every update from the moment of subscription;
    /// lagging subscribers lose the oldest pending updates, which is
    /// acceptable because status packets are idempotent refreshes.
    fn subscribe(&self) -> broadcast::Receiver<CdjStatus>;
}

/// A source of device announcement state.
pub trait AnnouncementSource: Send + Sync {
    /// Whether the device is currently announcing itself on the network.
    fn is_announced(&self, device: DeviceId) -> bool;

    /// Subscribes to device-disappearance notifications.
    fn subscribe_lost(&self) -> broadcast::Receiver<DeviceId>;
}
