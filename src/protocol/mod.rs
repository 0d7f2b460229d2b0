// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire-level collaborators for talking to UPnP devices.
//!
//! The core never opens sockets itself. It goes through a [`Transport`],
//! which sends event subscriptions and control actions and hands back raw
//! responses. [`HttpTransport`] is the production implementation; tests
//! substitute scripted transports.
//!
//! - [`soap`]: control action envelopes and fault extraction
//! - [`gena`]: lease headers, notification headers and property sets

pub mod gena;
#[cfg(feature = "http")]
mod http;
pub mod soap;

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpTransport};

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use url::Url;

use crate::error::TransportError;

/// Base URL of a device, as announced by discovery.
///
/// ```
/// use homehub_lib::protocol::Endpoint;
///
/// let endpoint = Endpoint::parse("http://192.168.1.20:49153/setup.xml").unwrap();
/// let url = endpoint.join("/upnp/control/basicevent1").unwrap();
/// assert_eq!(url.as_str(), "http://192.168.1.20:49153/upnp/control/basicevent1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parses a device URL.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the URL is malformed or
    /// has no host.
    pub fn parse(url: &str) -> Result<Self, TransportError> {
        let url =
            Url::parse(url).map_err(|e| TransportError::InvalidRequest(format!("{url}: {e}")))?;
        if url.host_str().is_none() {
            return Err(TransportError::InvalidRequest(format!(
                "{url}: missing host"
            )));
        }
        Ok(Self(url))
    }

    /// Resolves a control or event path against this endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidRequest` if the path cannot be joined.
    pub fn join(&self, path: &str) -> Result<Url, TransportError> {
        self.0
            .join(path)
            .map_err(|e| TransportError::InvalidRequest(format!("{path}: {e}")))
    }

    /// Host name or address of the device.
    #[must_use]
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Returns the underlying URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// An event subscription request.
///
/// `sid` is set when renewing; a device may still answer with a different
/// identifier, which then supersedes the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    /// Event path of the service, e.g. `/upnp/event/basicevent1`.
    pub event_path: String,
    /// Identifier of the lease being renewed.
    pub sid: Option<String>,
    /// Lease length asked of the device.
    pub timeout_secs: u64,
}

/// Raw answer to a subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeResponse {
    /// HTTP status code.
    pub status: u16,
    /// `SID` header.
    pub sid: Option<String>,
    /// `TIMEOUT` header, e.g. `Second-1800`.
    pub timeout: Option<String>,
}

impl SubscribeResponse {
    /// Returns `true` for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A control action to invoke on a device service.
///
/// ```
/// use homehub_lib::protocol::ActionRequest;
///
/// let request = ActionRequest::new(
///     "/upnp/control/basicevent1",
///     "urn:Belkin:service:basicevent:1",
///     "SetBinaryState",
/// )
/// .arg("BinaryState", "1");
///
/// assert_eq!(request.soap_action(), "\"urn:Belkin:service:basicevent:1#SetBinaryState\"");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Control path of the service.
    pub control_path: String,
    /// Service type URN.
    pub service: String,
    /// Action name.
    pub action: String,
    /// Arguments in the order the service declares them.
    pub args: Vec<(String, String)>,
}

impl ActionRequest {
    /// Creates an action without arguments.
    #[must_use]
    pub fn new(
        control_path: impl Into<String>,
        service: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            control_path: control_path.into(),
            service: service.into(),
            action: action.into(),
            args: Vec::new(),
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Value of the `SOAPACTION` header.
    #[must_use]
    pub fn soap_action(&self) -> String {
        format!("\"{}#{}\"", self.service, self.action)
    }
}

/// Raw answer to a control action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: String,
}

impl RawResponse {
    /// Returns `true` for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An inbound protocol event, as published on the `discovery` topic.
///
/// Header names are stored lowercased and looked up case-insensitively.
///
/// ```
/// use homehub_lib::protocol::ProtocolEvent;
///
/// let event = ProtocolEvent::new("NOTIFY", "/events/3")
///     .with_header("SID", "uuid:1")
///     .with_content("<e:propertyset/>");
/// assert_eq!(event.header("sid"), Some("uuid:1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolEvent {
    method: String,
    path: String,
    headers: BTreeMap<String, String>,
    content: String,
}

impl ProtocolEvent {
    /// Creates an event without headers or content.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Request method, e.g. `NOTIFY`.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path the event arrived on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Request body.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Sends subscriptions and control actions to devices.
///
/// Only connection-level failures are errors. Any status the device answers
/// with, success or not, is returned for the caller to classify.
pub trait Transport: Send + Sync + 'static {
    /// Requests or renews an event subscription.
    fn subscribe(
        &self,
        endpoint: &Endpoint,
        request: &SubscribeRequest,
    ) -> impl Future<Output = Result<SubscribeResponse, TransportError>> + Send;

    /// Cancels an event subscription, returning the HTTP status.
    fn unsubscribe(
        &self,
        endpoint: &Endpoint,
        event_path: &str,
        sid: &str,
    ) -> impl Future<Output = Result<u16, TransportError>> + Send;

    /// Posts a control action.
    fn invoke(
        &self,
        endpoint: &Endpoint,
        request: &ActionRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}
