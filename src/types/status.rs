// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device status values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a device.
///
/// Each device family only uses a subset of these values; the subset is
/// published in its [`Capabilities`](crate::Capabilities).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created, first observation pending.
    Waiting,
    /// Observed but not settled, or in transition.
    Busy,
    /// Switched on.
    On,
    /// Switched off.
    Off,
    /// Media renderer is stopped.
    Idle,
    /// Media renderer is playing.
    Playing,
    /// Media renderer is paused.
    Paused,
    /// Gateway is operational.
    Ready,
    /// Device is known to be on the network.
    Present,
    /// Failures persist.
    Error,
}

impl Status {
    /// Returns the lowercase status name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Busy => "busy",
            Self::On => "on",
            Self::Off => "off",
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Ready => "ready",
            Self::Present => "present",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Status::Playing).unwrap();
        assert_eq!(json, "\"playing\"");
    }
}
