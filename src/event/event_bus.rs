// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast bus for dispatcher lifecycle notifications.

use tokio::sync::broadcast;

use super::LifecycleEvent;

/// Default channel capacity for the lifecycle bus.
pub(crate) const DEFAULT_LIFECYCLE_CAPACITY: usize = 64;

/// Broadcasts [`LifecycleEvent`]s to any number of subscribers.
///
/// A slow subscriber that falls more than `capacity` events behind loses
/// the oldest ones and observes `RecvError::Lagged`.
///
/// # Examples
///
/// ```
/// use evdispatch::event::{DispatcherId, LifecycleBus, LifecycleEvent};
///
/// let bus = LifecycleBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(LifecycleEvent::started(DispatcherId::new()));
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LifecycleBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleBus {
    /// Creates a new bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LIFECYCLE_CAPACITY)
    }

    /// Creates a new bus with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to lifecycle events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event to all subscribers.
    ///
    /// Events published while nobody listens are discarded.
    pub fn publish(&self, event: LifecycleEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{DispatcherId, StopReason};

    #[test]
    fn new_bus_has_no_subscribers() {
        assert_eq!(LifecycleBus::new().subscriber_count(), 0);
    }

    #[test]
    fn drop_subscriber_decrements_count() {
        let bus = LifecycleBus::new();
        let rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn publish_delivers_to_every_subscriber() {
        let bus = LifecycleBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let id = DispatcherId::new();
        bus.publish(LifecycleEvent::stopped(id, StopReason::Requested));

        assert_eq!(rx1.recv().await.unwrap().dispatcher_id(), id);
        assert!(rx2.recv().await.unwrap().is_stop());
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = LifecycleBus::with_capacity(4);
        bus.publish(LifecycleEvent::started(DispatcherId::new()));
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = LifecycleBus::new();
        let bus2 = bus1.clone();
        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
