// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Media play modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Playback mode of a media renderer.
///
/// The hub names are short and lowercase; the renderer uses the UPnP
/// AVTransport names.
///
/// ```
/// use homehub_lib::types::PlayMode;
///
/// let mode: PlayMode = "Shuffle1".parse().unwrap();
/// assert_eq!(mode.as_upnp(), "SHUFFLE_NOREPEAT");
/// assert_eq!(PlayMode::from_upnp("REPEAT_ALL"), PlayMode::Repeat);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Play the queue once.
    #[default]
    Normal,
    /// Repeat the whole queue.
    Repeat,
    /// Shuffle and repeat.
    Shuffle,
    /// Shuffle without repeat.
    Shuffle1,
}

impl PlayMode {
    /// Returns the hub name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Repeat => "repeat",
            Self::Shuffle => "shuffle",
            Self::Shuffle1 => "shuffle1",
        }
    }

    /// Returns the AVTransport `PlayMode` value.
    #[must_use]
    pub const fn as_upnp(&self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Repeat => "REPEAT_ALL",
            Self::Shuffle => "SHUFFLE",
            Self::Shuffle1 => "SHUFFLE_NOREPEAT",
        }
    }

    /// Maps an AVTransport `PlayMode` value; unknown values are `Normal`.
    #[must_use]
    pub fn from_upnp(value: &str) -> Self {
        match value {
            "REPEAT_ALL" => Self::Repeat,
            "SHUFFLE" => Self::Shuffle,
            "SHUFFLE_NOREPEAT" => Self::Shuffle1,
            _ => Self::Normal,
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlayMode {
    type Err = ValueError;

    /// Parses a hub name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "repeat" => Ok(Self::Repeat),
            "shuffle" => Ok(Self::Shuffle),
            "shuffle1" => Ok(Self::Shuffle1),
            _ => Err(ValueError::InvalidPlayMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_upnp_mode_is_normal() {
        assert_eq!(PlayMode::from_upnp("SHUFFLE_REPEAT_ONE"), PlayMode::Normal);
    }

    #[test]
    fn rejects_unknown_name() {
        assert!("random".parse::<PlayMode>().is_err());
    }
}
