// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scripted transport for device unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::broker::Broker;
use crate::config::HubConfig;
use crate::error::TransportError;
use crate::event::EventBus;
use crate::manager::HubContext;
use crate::protocol::{
    ActionRequest, Endpoint, ProtocolEvent, RawResponse, SubscribeRequest, SubscribeResponse,
    Transport,
};

type Reply = Result<RawResponse, TransportError>;

/// Answers actions from per-action queues, falling back to an empty
/// success envelope, and grants every subscription.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    invoked: Mutex<Vec<ActionRequest>>,
    subscribed: Mutex<Vec<SubscribeRequest>>,
    unsubscribed: Mutex<Vec<String>>,
    next_sid: AtomicU64,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, action: &str, reply: Reply) {
        self.replies
            .lock()
            .entry(action.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Queues a successful reply carrying `args`.
    pub(crate) fn reply(&self, action: &str, args: &[(&str, &str)]) {
        self.push(
            action,
            Ok(RawResponse {
                status: 200,
                body: success(action, args),
            }),
        );
    }

    /// Queues a UPnP fault.
    pub(crate) fn fault(&self, action: &str, code: u16, description: &str) {
        self.push(
            action,
            Ok(RawResponse {
                status: 500,
                body: fault(code, description),
            }),
        );
    }

    /// Queues a connection failure.
    pub(crate) fn fail(&self, action: &str) {
        self.push(
            action,
            Err(TransportError::ConnectionFailed("connection refused".to_string())),
        );
    }

    /// Makes actions sent to `host` wait until the returned gate is
    /// notified.
    pub(crate) fn hold(&self, host: &str) -> Arc<Notify> {
        Arc::clone(self.gates.lock().entry(host.to_string()).or_default())
    }

    /// Every action invoked so far, in order.
    pub(crate) fn invoked(&self) -> Vec<ActionRequest> {
        self.invoked.lock().clone()
    }

    /// Invoked actions named `action`.
    pub(crate) fn calls(&self, action: &str) -> Vec<ActionRequest> {
        self.invoked
            .lock()
            .iter()
            .filter(|request| request.action == action)
            .cloned()
            .collect()
    }

    pub(crate) fn subscribed(&self) -> Vec<SubscribeRequest> {
        self.subscribed.lock().clone()
    }

    pub(crate) fn unsubscribed(&self) -> Vec<String> {
        self.unsubscribed.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn subscribe(
        &self,
        _endpoint: &Endpoint,
        request: &SubscribeRequest,
    ) -> Result<SubscribeResponse, TransportError> {
        self.subscribed.lock().push(request.clone());
        let n = self.next_sid.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubscribeResponse {
            status: 200,
            sid: Some(format!("uuid:{n}")),
            timeout: Some("Second-1800".to_string()),
        })
    }

    async fn unsubscribe(
        &self,
        _endpoint: &Endpoint,
        _event_path: &str,
        sid: &str,
    ) -> Result<u16, TransportError> {
        self.unsubscribed.lock().push(sid.to_string());
        Ok(200)
    }

    async fn invoke(
        &self,
        endpoint: &Endpoint,
        request: &ActionRequest,
    ) -> Result<RawResponse, TransportError> {
        let gate = self.gates.lock().get(endpoint.host()).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.invoked.lock().push(request.clone());
        let queued = self
            .replies
            .lock()
            .get_mut(&request.action)
            .and_then(VecDeque::pop_front);
        queued.unwrap_or_else(|| {
            Ok(RawResponse {
                status: 200,
                body: success(&request.action, &[]),
            })
        })
    }
}

pub(crate) fn success(action: &str, args: &[(&str, &str)]) -> String {
    let args: String = args
        .iter()
        .map(|(name, value)| {
            format!(
                "<{name}>{}</{name}>",
                quick_xml::escape::escape(*value)
            )
        })
        .collect();
    format!(
        "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
         <u:{action}Response xmlns:u=\"urn:test\">{args}</u:{action}Response>\
         </s:Body></s:Envelope>"
    )
}

pub(crate) fn fault(code: u16, description: &str) -> String {
    format!(
        "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body><s:Fault>\
         <faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring>\
         <detail><UPnPError><errorCode>{code}</errorCode>\
         <errorDescription>{description}</errorDescription></UPnPError></detail>\
         </s:Fault></s:Body></s:Envelope>"
    )
}

/// A `NOTIFY` carrying one property.
pub(crate) fn notify(sid: &str, seq: u64, property: &str, value: &str) -> ProtocolEvent {
    ProtocolEvent::new("NOTIFY", "/events")
        .with_header("SID", sid)
        .with_header("SEQ", seq.to_string())
        .with_content(format!(
            "<e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\"><e:property>\
             <{property}>{}</{property}></e:property></e:propertyset>",
            quick_xml::escape::escape(value)
        ))
}

pub(crate) fn context() -> HubContext {
    HubContext::new(Arc::new(Broker::new()), EventBus::new(), HubConfig::default())
}

pub(crate) fn endpoint() -> Endpoint {
    Endpoint::parse("http://192.168.1.40:49153/setup.xml").expect("valid endpoint")
}
