// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change-detecting state holder.

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::event::{DeviceEvent, DeviceId, EventBus};

use super::{DeviceState, StateChange};

/// Owns the state of one device and publishes genuine changes.
///
/// Polling and event notifications both refresh the same fields, so most
/// applications change nothing. Only a change that alters at least one
/// field replaces the snapshot, refreshes its timestamp and signals
/// observers, both on the hub's [`EventBus`] and on this store's own
/// `watch` channel.
///
/// # Examples
///
/// ```
/// use homehub_lib::event::{DeviceId, EventBus};
/// use homehub_lib::state::{DeviceState, DeviceStateStore, StateChange};
/// use homehub_lib::types::Status;
///
/// let store = DeviceStateStore::new(
///     DeviceId::new(1),
///     DeviceState::new("Desk", "/device/switch/wemo/onoff", Status::Waiting),
///     EventBus::new(),
/// );
///
/// let change = StateChange::status(Status::On);
/// assert!(store.apply(&change));
/// assert!(!store.apply(&change));
/// ```
#[derive(Debug)]
pub struct DeviceStateStore {
    device_id: DeviceId,
    current: Mutex<DeviceState>,
    events: EventBus,
    watch_tx: watch::Sender<DeviceState>,
}

impl DeviceStateStore {
    /// Creates a store holding `initial`.
    #[must_use]
    pub fn new(device_id: DeviceId, initial: DeviceState, events: EventBus) -> Self {
        let (watch_tx, _) = watch::channel(initial.clone());
        Self {
            device_id,
            current: Mutex::new(initial),
            events,
            watch_tx,
        }
    }

    /// The device whose state this is.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Returns a copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> DeviceState {
        self.current.lock().clone()
    }

    /// Returns a receiver that always holds the latest snapshot.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DeviceState> {
        self.watch_tx.subscribe()
    }

    /// Applies `change` and reports whether anything differed.
    ///
    /// The snapshot is replaced as a whole; readers never see a partially
    /// applied batch.
    pub fn apply(&self, change: &StateChange) -> bool {
        let updated = {
            let mut current = self.current.lock();
            let mut next = current.clone();
            if !next.apply(change) {
                tracing::trace!(device = %self.device_id, "State unchanged");
                return false;
            }
            next.touch(Utc::now());
            *current = next.clone();
            next
        };

        tracing::debug!(
            device = %self.device_id,
            status = %updated.status(),
            "Device state changed"
        );
        self.watch_tx.send_replace(updated.clone());
        self.events.publish(DeviceEvent::StateChanged {
            device_id: self.device_id,
            state: updated,
        });
        true
    }
}
