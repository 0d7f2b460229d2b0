// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery announcements.

use serde::{Deserialize, Serialize};

use crate::capabilities::DeviceKind;
use crate::error::TransportError;
use crate::protocol::Endpoint;

/// A device as announced by the discovery collaborator.
///
/// # Examples
///
/// ```
/// use homehub_lib::DeviceKind;
/// use homehub_lib::manager::DeviceInfo;
///
/// let info = DeviceInfo::new(
///     "uuid:RINCON_000E58A0C0FE01400",
///     "urn:schemas-upnp-org:device:ZonePlayer:1",
///     "http://192.168.1.31:1400/xml/device_description.xml",
/// );
/// assert_eq!(info.kind(), Some(DeviceKind::SonosSpeaker));
/// assert_eq!(info.display_name(), "uuid:RINCON_000E58A0C0FE01400");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable identifier of the device, usually its UPnP UDN.
    pub uid: String,
    /// Device type tag.
    #[serde(rename = "deviceType")]
    pub device_type: String,
    /// Friendly name; empty if the device announced none.
    #[serde(default)]
    pub name: String,
    /// Location of the device description.
    pub url: String,
}

impl DeviceInfo {
    /// Creates an announcement without a friendly name.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        device_type: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            device_type: device_type.into(),
            name: String::new(),
            url: url.into(),
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Family of the announced device, if supported.
    #[must_use]
    pub fn kind(&self) -> Option<DeviceKind> {
        DeviceKind::from_device_type(&self.device_type)
    }

    /// The friendly name, or the UID when there is none.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.uid
        } else {
            &self.name
        }
    }

    /// Parses the announced location.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the URL is malformed.
    pub fn endpoint(&self) -> Result<Endpoint, TransportError> {
        Endpoint::parse(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn announcements_decode_from_json() {
        let info: DeviceInfo = serde_json::from_str(
            r#"{"uid":"gwr-1","deviceType":"GreenWave GOP","url":"http://192.168.1.9/"}"#,
        )
        .unwrap();
        assert_eq!(info.kind(), Some(DeviceKind::LightingGateway));
        assert_eq!(info.display_name(), "gwr-1");
        assert!(info.endpoint().is_ok());
    }

    #[test]
    fn bad_location_is_rejected() {
        let info = DeviceInfo::new("x", DeviceKind::WEMO_SWITCH_TYPE, "not a url");
        assert!(matches!(
            info.endpoint(),
            Err(TransportError::InvalidRequest(_))
        ));
    }

    #[test]
    fn unknown_types_have_no_kind() {
        let info = DeviceInfo::new("x", "urn:schemas-upnp-org:device:MediaServer:1", "http://h/")
            .with_name("NAS");
        assert_eq!(info.kind(), None);
        assert_eq!(info.display_name(), "NAS");
    }
}
