// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device event types.

use serde::{Deserialize, Serialize};

use crate::state::DeviceState;

use super::DeviceId;

/// Events observers receive from the hub.
///
/// `StateChanged` is only emitted for genuine transitions: the state store
/// suppresses updates that leave every field unchanged.
///
/// # Examples
///
/// ```
/// use homehub_lib::event::{DeviceId, DeviceEvent};
///
/// let device_id = DeviceId::new(1);
/// let added = DeviceEvent::DeviceAdded { device_id };
/// assert_eq!(added.device_id(), device_id);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// A device came online in the hub.
    DeviceAdded {
        /// The ID of the added device.
        device_id: DeviceId,
    },

    /// A device was torn down.
    DeviceRemoved {
        /// The ID of the removed device.
        device_id: DeviceId,
    },

    /// The state of a device changed.
    StateChanged {
        /// The ID of the device.
        device_id: DeviceId,
        /// The complete new state, including its timestamp.
        state: DeviceState,
    },
}

impl DeviceEvent {
    /// Returns the device ID associated with this event.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::DeviceAdded { device_id }
            | Self::DeviceRemoved { device_id }
            | Self::StateChanged { device_id, .. } => *device_id,
        }
    }

    /// Returns the state snapshot of a `StateChanged` event.
    #[must_use]
    pub fn state(&self) -> Option<&DeviceState> {
        match self {
            Self::StateChanged { state, .. } => Some(state),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_on_state_changed() {
        let event = DeviceEvent::DeviceRemoved {
            device_id: DeviceId::new(3),
        };
        assert!(event.state().is_none());
        assert_eq!(event.device_id(), DeviceId::new(3));
    }

    #[test]
    fn serializes_with_tag() {
        let event = DeviceEvent::DeviceAdded {
            device_id: DeviceId::new(9),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "device_added");
        assert_eq!(json["device_id"], 9);
    }
}
