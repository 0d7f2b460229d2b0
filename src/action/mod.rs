// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control actions and their outcome.
//!
//! [`ActionInvoker::invoke`] sends one action and classifies what came back
//! into an [`ActionOutcome`]:
//!
//! | Response | Outcome |
//! |----------|---------|
//! | no response at all | `TransportError` |
//! | envelope without a `Body` | `TransportError` (malformed) |
//! | non-2xx without a decodable envelope | `TransportError` (status) |
//! | one or more embedded `Fault`s, any status | `ProtocolFault` |
//! | fault-free envelope | `Success` |
//!
//! A fault-free envelope is a success even when the response element is
//! missing; the payload is then empty and callers check for the values
//! they need. Values are never converted.

mod fault;

pub use fault::Fault;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::TransportError;
use crate::protocol::{ActionRequest, Endpoint, RawResponse, Transport, soap};

/// Response arguments of a successful action, as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionPayload(BTreeMap<String, String>);

impl ActionPayload {
    /// Returns an argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Returns `true` if the response carried no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the arguments.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for ActionPayload {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Classified result of one control action.
#[derive(Debug)]
pub enum ActionOutcome {
    /// Nothing usable was received.
    TransportError(TransportError),
    /// The device reported application-level faults.
    ProtocolFault(Vec<Fault>),
    /// The action succeeded.
    Success(ActionPayload),
}

impl ActionOutcome {
    /// Returns the payload of a success.
    #[must_use]
    pub fn payload(&self) -> Option<&ActionPayload> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    /// Returns `true` for `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Classifies a raw response.
    #[must_use]
    pub fn classify(response: &RawResponse, action: &str) -> Self {
        let decoded = match soap::parse_response(&response.body, action) {
            Ok(decoded) => decoded,
            Err(err) if response.is_success() => {
                return Self::TransportError(TransportError::MalformedResponse(err.to_string()));
            }
            Err(_) => return Self::TransportError(TransportError::Status(response.status)),
        };

        if !decoded.faults.is_empty() {
            return Self::ProtocolFault(decoded.faults);
        }
        if !response.is_success() {
            return Self::TransportError(TransportError::Status(response.status));
        }
        if !decoded.has_body {
            return Self::TransportError(TransportError::MalformedResponse(
                "response envelope has no Body".to_string(),
            ));
        }
        if !decoded.has_response {
            tracing::debug!(action, "Fault-free response without response element");
        }
        Self::Success(decoded.results.into())
    }
}

/// Sends control actions through a [`Transport`].
///
/// The invoker has no side effects beyond the network call; callers
/// update device state after inspecting the outcome.
#[derive(Debug)]
pub struct ActionInvoker<T> {
    transport: Arc<T>,
}

impl<T> Clone for ActionInvoker<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> ActionInvoker<T> {
    /// Creates an invoker over `transport`.
    #[must_use]
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Sends `request` to `endpoint` and classifies the response.
    pub async fn invoke(&self, endpoint: &Endpoint, request: &ActionRequest) -> ActionOutcome {
        let response = match self.transport.invoke(endpoint, request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    endpoint = %endpoint,
                    action = %request.action,
                    error = %err,
                    "Action failed to reach device"
                );
                return ActionOutcome::TransportError(err);
            }
        };

        let outcome = ActionOutcome::classify(&response, &request.action);
        match &outcome {
            ActionOutcome::TransportError(err) => tracing::warn!(
                endpoint = %endpoint,
                action = %request.action,
                error = %err,
                "Unusable action response"
            ),
            ActionOutcome::ProtocolFault(faults) => {
                for fault in faults {
                    tracing::error!(
                        endpoint = %endpoint,
                        action = %request.action,
                        fault = %fault,
                        "Device reported fault"
                    );
                }
            }
            ActionOutcome::Success(_) => {
                tracing::debug!(endpoint = %endpoint, action = %request.action, "Action succeeded");
            }
        }
        outcome
    }
}
