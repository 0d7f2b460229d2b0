// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Application-level faults embedded in action responses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A fault record from a response envelope.
///
/// `code` and `description` are the SOAP `faultcode`/`faultstring`; the
/// UPnP detail, when present, carries the device's own error number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    code: String,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upnp_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    upnp_description: Option<String>,
}

impl Fault {
    /// Creates a fault without UPnP detail.
    #[must_use]
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            upnp_code: None,
            upnp_description: None,
        }
    }

    /// Attaches the UPnP error detail.
    #[must_use]
    pub fn with_upnp(mut self, code: u16, description: impl Into<String>) -> Self {
        self.upnp_code = Some(code);
        self.upnp_description = Some(description.into());
        self
    }

    /// SOAP fault code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// SOAP fault string.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// UPnP error code.
    #[must_use]
    pub fn upnp_code(&self) -> Option<u16> {
        self.upnp_code
    }

    /// UPnP error description.
    #[must_use]
    pub fn upnp_description(&self) -> Option<&str> {
        self.upnp_description.as_deref()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.description)?;
        if let Some(code) = self.upnp_code {
            write!(f, " (UPnP {code}")?;
            if let Some(description) = &self.upnp_description {
                write!(f, ", {description}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}
