// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device families and what each of them can do.
//!
//! The hub supports a closed set of device families. Discovery announces a
//! device type tag, [`DeviceKind::from_device_type`] maps it to a family,
//! and the family's [`Capabilities`] describe the performs it accepts, the
//! statuses it reports and the properties it publishes.

use std::fmt;

use crate::types::Status;

/// A supported device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Belkin Wemo on/off switch.
    WemoSwitch,
    /// Sonos zone player.
    SonosSpeaker,
    /// Sonos zone bridge.
    SonosBridge,
    /// GreenWave lighting gateway.
    LightingGateway,
    /// LED bulb behind a lighting gateway.
    Led,
}

impl DeviceKind {
    /// Device type tag announced by discovery for a Wemo switch.
    pub const WEMO_SWITCH_TYPE: &'static str = "urn:Belkin:device:controllee:1";
    /// Device type tag announced by discovery for a Sonos zone player.
    pub const SONOS_SPEAKER_TYPE: &'static str = "urn:schemas-upnp-org:device:ZonePlayer:1";
    /// Device type tag announced by discovery for a Sonos bridge.
    pub const SONOS_BRIDGE_TYPE: &'static str = "Sonos ZoneBridge ZB100";
    /// Device type tag announced by discovery for a GreenWave gateway.
    pub const LIGHTING_GATEWAY_TYPE: &'static str = "GreenWave GOP";

    /// Maps a discovery type tag to a family.
    ///
    /// LEDs are never discovered directly; they appear as gateway children.
    ///
    /// ```
    /// use homehub_lib::DeviceKind;
    ///
    /// assert_eq!(
    ///     DeviceKind::from_device_type("urn:Belkin:device:controllee:1"),
    ///     Some(DeviceKind::WemoSwitch)
    /// );
    /// assert_eq!(DeviceKind::from_device_type("urn:example:device:toaster:1"), None);
    /// ```
    #[must_use]
    pub fn from_device_type(tag: &str) -> Option<Self> {
        match tag {
            Self::WEMO_SWITCH_TYPE => Some(Self::WemoSwitch),
            Self::SONOS_SPEAKER_TYPE => Some(Self::SonosSpeaker),
            Self::SONOS_BRIDGE_TYPE => Some(Self::SonosBridge),
            Self::LIGHTING_GATEWAY_TYPE => Some(Self::LightingGateway),
            _ => None,
        }
    }

    /// Type path reported as `whatami`.
    #[must_use]
    pub const fn whatami(&self) -> &'static str {
        match self {
            Self::WemoSwitch => "/device/switch/wemo/onoff",
            Self::SonosSpeaker => "/device/media/sonos/audio",
            Self::SonosBridge => "/device/gateway/sonos/bridge",
            Self::LightingGateway => "/device/gateway/greenwave-gop/lighting",
            Self::Led => "/device/lighting/tcpi/led",
        }
    }

    /// Returns the capabilities of this family.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Self::WemoSwitch => Capabilities::wemo_switch(),
            Self::SonosSpeaker => Capabilities::sonos_speaker(),
            Self::SonosBridge => Capabilities::sonos_bridge(),
            Self::LightingGateway => Capabilities::lighting_gateway(),
            Self::Led => Capabilities::led(),
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.whatami())
    }
}

/// What a device family supports.
///
/// `performs` lists the perform names beyond `set`, which every family
/// accepts for renaming.
///
/// # Examples
///
/// ```
/// use homehub_lib::{Capabilities, DeviceKind};
/// use homehub_lib::types::Status;
///
/// let switch = DeviceKind::WemoSwitch.capabilities();
/// assert!(switch.supports("on"));
/// assert!(switch.supports("set"));
/// assert!(!switch.supports("play"));
/// assert!(switch.reports(Status::Waiting));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Type path of the family.
    pub whatami: &'static str,

    /// Accepted perform names, `set` excluded.
    pub performs: &'static [&'static str],

    /// Statuses the family reports.
    pub statuses: &'static [Status],

    /// Names of the published properties.
    pub properties: &'static [&'static str],
}

impl Capabilities {
    /// Wemo on/off switch.
    #[must_use]
    pub const fn wemo_switch() -> Self {
        Self {
            whatami: DeviceKind::WemoSwitch.whatami(),
            performs: &["on", "off"],
            statuses: &[
                Status::Waiting,
                Status::Busy,
                Status::On,
                Status::Off,
                Status::Error,
            ],
            properties: &["name", "status"],
        }
    }

    /// Sonos zone player.
    #[must_use]
    pub const fn sonos_speaker() -> Self {
        Self {
            whatami: DeviceKind::SonosSpeaker.whatami(),
            performs: &[
                "play",
                "stop",
                "pause",
                "queueNext",
                "flush",
                "next",
                "previous",
            ],
            statuses: &[
                Status::Idle,
                Status::Playing,
                Status::Paused,
                Status::Busy,
                Status::Error,
            ],
            properties: &["name", "status", "track", "mode", "volume", "muted"],
        }
    }

    /// Sonos zone bridge.
    #[must_use]
    pub const fn sonos_bridge() -> Self {
        Self {
            whatami: DeviceKind::SonosBridge.whatami(),
            performs: &[],
            statuses: &[Status::Present],
            properties: &["name", "status"],
        }
    }

    /// GreenWave lighting gateway.
    #[must_use]
    pub const fn lighting_gateway() -> Self {
        Self {
            whatami: DeviceKind::LightingGateway.whatami(),
            performs: &[],
            statuses: &[Status::Ready, Status::Error],
            properties: &["name", "status", "children"],
        }
    }

    /// LED bulb behind a lighting gateway.
    #[must_use]
    pub const fn led() -> Self {
        Self {
            whatami: DeviceKind::Led.whatami(),
            performs: &["off", "on"],
            statuses: &[Status::On, Status::Off],
            properties: &["name", "status", "brightness"],
        }
    }

    /// Returns `true` if `perform` is accepted.
    #[must_use]
    pub fn supports(&self, perform: &str) -> bool {
        perform == "set" || self.performs.contains(&perform)
    }

    /// Returns `true` if the family can report `status`.
    #[must_use]
    pub fn reports(&self, status: Status) -> bool {
        self.statuses.contains(&status)
    }
}
