// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a device, assigned by the persistent registry.
///
/// The identifier is stable for as long as the registry keeps the record,
/// so it survives hub restarts and gateway refreshes.
///
/// # Examples
///
/// ```
/// use homehub_lib::event::DeviceId;
///
/// let id = DeviceId::new(7);
/// assert_eq!(id.actor(), "device/7");
/// assert_eq!(DeviceId::from_actor("device/7"), Some(id));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u64);

impl DeviceId {
    /// Wraps a registry-assigned identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns the actor address commands use to target this device.
    #[must_use]
    pub fn actor(&self) -> String {
        format!("device/{}", self.0)
    }

    /// Parses an actor address of the form `device/<id>`.
    #[must_use]
    pub fn from_actor(actor: &str) -> Option<Self> {
        actor.strip_prefix("device/")?.parse().ok()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
