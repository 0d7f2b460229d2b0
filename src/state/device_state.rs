// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Status;

use super::StateChange;

/// Snapshot of a device as observers see it.
///
/// The property bag is free-form because each device family reports its own
/// properties (a speaker has `volume` and `track`, a bulb `brightness`).
///
/// # Examples
///
/// ```
/// use homehub_lib::state::{DeviceState, StateChange};
/// use homehub_lib::types::Status;
///
/// let mut state = DeviceState::new("Desk", "/device/switch/wemo/onoff", Status::Waiting);
/// assert!(state.apply(&StateChange::status(Status::On)));
/// assert!(!state.apply(&StateChange::status(Status::On)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    name: String,
    whatami: String,
    status: Status,
    #[serde(rename = "info")]
    properties: Map<String, Value>,
    updated: DateTime<Utc>,
}

impl DeviceState {
    /// Creates a state with an empty property bag, stamped now.
    #[must_use]
    pub fn new(name: impl Into<String>, whatami: impl Into<String>, status: Status) -> Self {
        Self {
            name: name.into(),
            whatami: whatami.into(),
            status,
            properties: Map::new(),
            updated: Utc::now(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type path of the device family.
    #[must_use]
    pub fn whatami(&self) -> &str {
        &self.whatami
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the whole property bag.
    #[must_use]
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Time of the last genuine change.
    #[must_use]
    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        self.updated = at;
    }

    /// Applies a change, comparing field by field.
    ///
    /// Returns `true` if any field differs afterwards. The timestamp is not
    /// touched; [`DeviceStateStore`](super::DeviceStateStore) refreshes it.
    pub fn apply(&mut self, change: &StateChange) -> bool {
        match change {
            StateChange::Name(name) => {
                if self.name == *name {
                    false
                } else {
                    self.name.clone_from(name);
                    true
                }
            }
            StateChange::Status(status) => {
                if self.status == *status {
                    false
                } else {
                    self.status = *status;
                    true
                }
            }
            StateChange::Property { key, value } => {
                if self.properties.get(key) == Some(value) {
                    false
                } else {
                    self.properties.insert(key.clone(), value.clone());
                    true
                }
            }
            StateChange::RemoveProperty(key) => self.properties.remove(key).is_some(),
            StateChange::Batch(changes) => {
                let mut changed = false;
                for change in changes {
                    changed |= self.apply(change);
                }
                changed
            }
        }
    }
}
