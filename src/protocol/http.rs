// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for UPnP devices.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use reqwest::{Client, Method};

use crate::error::TransportError;
use crate::protocol::{
    ActionRequest, Endpoint, RawResponse, SubscribeRequest, SubscribeResponse, Transport, soap,
};

/// Configuration of the HTTP transport.
///
/// # Examples
///
/// ```
/// use homehub_lib::protocol::HttpConfig;
/// use std::time::Duration;
///
/// let config = HttpConfig::new("http://192.168.1.2:8887/events")
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(config.callback_url(), "http://192.168.1.2:8887/events");
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    callback_url: String,
    timeout: Duration,
}

impl HttpConfig {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration delivering notifications to `callback_url`.
    ///
    /// # Arguments
    ///
    /// * `callback_url` - URL of the hub's `NOTIFY` listener
    #[must_use]
    pub fn new(callback_url: impl Into<String>) -> Self {
        Self {
            callback_url: callback_url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the callback URL.
    #[must_use]
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    /// Returns the timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates an `HttpTransport` from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_transport(self) -> Result<HttpTransport, TransportError> {
        let client = Client::builder().timeout(self.timeout).build()?;
        Ok(HttpTransport {
            client,
            callback_url: self.callback_url,
        })
    }
}

/// [`Transport`] over HTTP.
///
/// Sends `SUBSCRIBE`/`UNSUBSCRIBE` for eventing and SOAP `POST`s for
/// control actions.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    callback_url: String,
}

fn extension_method(name: &str) -> Result<Method, TransportError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| TransportError::InvalidRequest(format!("{name}: {e}")))
}

/// Refused connections and timeouts mean the device is unreachable.
fn send_error(err: reqwest::Error) -> TransportError {
    if err.is_connect() || err.is_timeout() {
        TransportError::ConnectionFailed(err.to_string())
    } else {
        TransportError::Http(err)
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
}

impl Transport for HttpTransport {
    async fn subscribe(
        &self,
        endpoint: &Endpoint,
        request: &SubscribeRequest,
    ) -> Result<SubscribeResponse, TransportError> {
        let url = endpoint.join(&request.event_path)?;

        let builder = self
            .client
            .request(extension_method("SUBSCRIBE")?, url.clone())
            .header("TIMEOUT", format!("Second-{}", request.timeout_secs));
        let builder = match &request.sid {
            Some(sid) => builder.header("SID", sid.as_str()),
            None => builder
                .header("CALLBACK", format!("<{}>", self.callback_url))
                .header("NT", "upnp:event"),
        };

        tracing::debug!(url = %url, renewal = request.sid.is_some(), "Sending SUBSCRIBE");
        let response = builder.send().await.map_err(send_error)?;

        let status = response.status().as_u16();
        let headers = response.headers();
        Ok(SubscribeResponse {
            status,
            sid: header(headers, "sid"),
            timeout: header(headers, "timeout"),
        })
    }

    async fn unsubscribe(
        &self,
        endpoint: &Endpoint,
        event_path: &str,
        sid: &str,
    ) -> Result<u16, TransportError> {
        let url = endpoint.join(event_path)?;

        tracing::debug!(url = %url, sid, "Sending UNSUBSCRIBE");
        let response = self
            .client
            .request(extension_method("UNSUBSCRIBE")?, url)
            .header("SID", sid)
            .send()
            .await
            .map_err(send_error)?;

        Ok(response.status().as_u16())
    }

    async fn invoke(
        &self,
        endpoint: &Endpoint,
        request: &ActionRequest,
    ) -> Result<RawResponse, TransportError> {
        let url = endpoint.join(&request.control_path)?;

        tracing::debug!(url = %url, action = %request.action, "Sending SOAP action");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", request.soap_action())
            .body(soap::envelope(request))
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::trace!(status, body = %body, "Received SOAP response");

        Ok(RawResponse { status, body })
    }
}
