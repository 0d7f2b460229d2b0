// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting device events.

use tokio::sync::broadcast;

use super::DeviceEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out channel carrying [`DeviceEvent`]s to observers.
///
/// One bus is shared by every device of a hub. Observers (UI, persistence,
/// automation rules) each hold a receiver and get their own copy of every
/// event published after they subscribed.
///
/// # Capacity
///
/// The event bus has a fixed capacity (default 256). If the channel fills
/// up because an observer is slow, older events are dropped for that
/// observer only (it receives `RecvError::Lagged`).
///
/// # Examples
///
/// ```
/// use homehub_lib::event::{DeviceId, DeviceEvent, EventBus};
///
/// let bus = EventBus::new();
///
/// let mut rx = bus.subscribe();
/// let delivered = bus.publish_counted(DeviceEvent::DeviceAdded {
///     device_id: DeviceId::new(1),
/// });
/// assert_eq!(delivered, 1);
/// assert!(rx.try_recv().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DeviceEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus buffering at most `capacity` events per observer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns a receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Without observers the event is discarded.
    pub fn publish(&self, event: DeviceEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No observers for device event");
        }
    }

    /// Publishes an event and returns how many observers received it.
    #[must_use]
    pub fn publish_counted(&self, event: DeviceEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::DeviceId;
    use crate::state::DeviceState;
    use crate::types::Status;

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn state_changes_reach_every_observer() {
        let bus = EventBus::new();
        let mut ui = bus.subscribe();
        let mut rules = bus.subscribe();

        let device_id = DeviceId::new(4);
        let state = DeviceState::new("Lamp", "/device/lighting/tcpi/led", Status::On);
        bus.publish(DeviceEvent::StateChanged {
            device_id,
            state: state.clone(),
        });

        assert_eq!(ui.recv().await.unwrap().state(), Some(&state));
        assert_eq!(rules.recv().await.unwrap().device_id(), device_id);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(DeviceEvent::DeviceAdded {
            device_id: DeviceId::new(1),
        });

        let mut rx = bus.subscribe();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publish_counted_without_subscribers() {
        let bus = EventBus::with_capacity(8);
        let count = bus.publish_counted(DeviceEvent::DeviceRemoved {
            device_id: DeviceId::new(2),
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
