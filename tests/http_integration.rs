// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the HTTP transport using wiremock.

use std::sync::Arc;

use homehub_lib::action::{ActionInvoker, ActionOutcome};
use homehub_lib::config::LeaseConfig;
use homehub_lib::protocol::{
    ActionRequest, Endpoint, HttpConfig, HttpTransport, SubscribeRequest, Transport,
};
use homehub_lib::subscription::{LeaseState, SubscriptionLeaseManager};
use homehub_lib::TransportError;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EVENT_PATH: &str = "/upnp/event/basicevent1";
const CONTROL_PATH: &str = "/upnp/control/basicevent1";
const SERVICE: &str = "urn:Belkin:service:basicevent:1";

const BINARY_STATE: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:GetBinaryStateResponse xmlns:u="urn:Belkin:service:basicevent:1"><BinaryState>1|1457|0|0</BinaryState></u:GetBinaryStateResponse></s:Body></s:Envelope>"#;

const FAULT: &str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>402</errorCode><errorDescription>Invalid Args</errorDescription></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#;

fn transport() -> HttpTransport {
    HttpConfig::new("http://192.168.1.2:3400/events")
        .into_transport()
        .unwrap()
}

fn endpoint(server: &MockServer) -> Endpoint {
    Endpoint::parse(&format!("{}/setup.xml", server.uri())).unwrap()
}

// ============================================================================
// Eventing
// ============================================================================

mod eventing {
    use super::*;

    #[tokio::test]
    async fn new_subscription_sends_callback() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(path(EVENT_PATH))
            .and(header("CALLBACK", "<http://192.168.1.2:3400/events>"))
            .and(header("NT", "upnp:event"))
            .and(header("TIMEOUT", "Second-1800"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("SID", "uuid:4f2d6a1e-7c3b")
                    .insert_header("TIMEOUT", "Second-300"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = SubscribeRequest {
            event_path: EVENT_PATH.to_string(),
            sid: None,
            timeout_secs: 1800,
        };
        let response = transport()
            .subscribe(&endpoint(&server), &request)
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.sid.as_deref(), Some("uuid:4f2d6a1e-7c3b"));
        assert_eq!(response.timeout.as_deref(), Some("Second-300"));
    }

    #[tokio::test]
    async fn renewal_sends_sid() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(path(EVENT_PATH))
            .and(header("SID", "uuid:4f2d6a1e-7c3b"))
            .respond_with(ResponseTemplate::new(200).insert_header("SID", "uuid:4f2d6a1e-7c3b"))
            .expect(1)
            .mount(&server)
            .await;

        let request = SubscribeRequest {
            event_path: EVENT_PATH.to_string(),
            sid: Some("uuid:4f2d6a1e-7c3b".to_string()),
            timeout_secs: 1800,
        };
        let response = transport()
            .subscribe(&endpoint(&server), &request)
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.timeout, None);
    }

    #[tokio::test]
    async fn rejected_subscription_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let request = SubscribeRequest {
            event_path: EVENT_PATH.to_string(),
            sid: Some("uuid:expired".to_string()),
            timeout_secs: 1800,
        };
        let response = transport()
            .subscribe(&endpoint(&server), &request)
            .await
            .unwrap();

        assert!(!response.is_success());
        assert_eq!(response.sid, None);
    }

    #[tokio::test]
    async fn unsubscribe_sends_sid() {
        let server = MockServer::start().await;
        Mock::given(method("UNSUBSCRIBE"))
            .and(path(EVENT_PATH))
            .and(header("SID", "uuid:4f2d6a1e-7c3b"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let status = transport()
            .unsubscribe(&endpoint(&server), EVENT_PATH, "uuid:4f2d6a1e-7c3b")
            .await
            .unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn lease_acquires_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .and(path(EVENT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("SID", "uuid:lease-1")
                    .insert_header("TIMEOUT", "Second-1800"),
            )
            .mount(&server)
            .await;
        Mock::given(method("UNSUBSCRIBE"))
            .and(header("SID", "uuid:lease-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let lease = SubscriptionLeaseManager::new(
            Arc::new(transport()),
            endpoint(&server),
            EVENT_PATH,
            LeaseConfig::default(),
        );

        assert_eq!(lease.acquire().await, LeaseState::Active);
        assert_eq!(lease.sid().as_deref(), Some("uuid:lease-1"));
        assert_eq!(lease.expected_sequence(), 0);

        lease.shutdown().await;
        assert_eq!(lease.state(), LeaseState::Unsubscribed);
        assert_eq!(lease.sid(), None);
    }

    #[tokio::test]
    async fn lease_without_sid_is_not_active() {
        let server = MockServer::start().await;
        Mock::given(method("SUBSCRIBE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let lease = SubscriptionLeaseManager::new(
            Arc::new(transport()),
            endpoint(&server),
            EVENT_PATH,
            LeaseConfig::default(),
        );

        assert_eq!(lease.acquire().await, LeaseState::Subscribing);
        assert_eq!(lease.sid(), None);
        assert_eq!(lease.failures(), 1);
        lease.shutdown().await;
    }
}

// ============================================================================
// Control actions
// ============================================================================

mod control {
    use super::*;

    fn get_binary_state() -> ActionRequest {
        ActionRequest::new(CONTROL_PATH, SERVICE, "GetBinaryState")
    }

    #[tokio::test]
    async fn invoke_posts_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CONTROL_PATH))
            .and(header(
                "SOAPACTION",
                "\"urn:Belkin:service:basicevent:1#SetBinaryState\"",
            ))
            .and(header_exists("content-type"))
            .and(body_string_contains("<BinaryState>1</BinaryState>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
                 <u:SetBinaryStateResponse xmlns:u=\"urn:Belkin:service:basicevent:1\"/>\
                 </s:Body></s:Envelope>",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let request = ActionRequest::new(CONTROL_PATH, SERVICE, "SetBinaryState")
            .arg("BinaryState", "1");
        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint(&server), &request)
            .await;

        assert!(outcome.is_success());
        assert!(outcome.payload().unwrap().is_empty());
    }

    #[tokio::test]
    async fn arguments_are_escaped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("<FriendlyName>Tom &amp; Jerry</FriendlyName>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BINARY_STATE))
            .expect(1)
            .mount(&server)
            .await;

        let request = ActionRequest::new(CONTROL_PATH, SERVICE, "ChangeFriendlyName")
            .arg("FriendlyName", "Tom & Jerry");
        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint(&server), &request)
            .await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn response_values_are_returned_raw() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BINARY_STATE))
            .mount(&server)
            .await;

        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint(&server), &get_binary_state())
            .await;

        let payload = outcome.payload().unwrap();
        assert_eq!(payload.get("BinaryState"), Some("1|1457|0|0"));
    }

    #[tokio::test]
    async fn fault_with_error_status_is_protocol_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string(FAULT))
            .mount(&server)
            .await;

        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint(&server), &get_binary_state())
            .await;

        let ActionOutcome::ProtocolFault(faults) = outcome else {
            panic!("expected a fault, got {outcome:?}");
        };
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].upnp_code(), Some(402));
        assert_eq!(faults[0].upnp_description(), Some("Invalid Args"));
    }

    #[tokio::test]
    async fn error_status_without_envelope_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint(&server), &get_binary_state())
            .await;

        assert!(matches!(
            outcome,
            ActionOutcome::TransportError(TransportError::Status(503))
        ));
    }

    #[tokio::test]
    async fn envelope_without_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"/>",
            ))
            .mount(&server)
            .await;

        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint(&server), &get_binary_state())
            .await;

        assert!(matches!(
            outcome,
            ActionOutcome::TransportError(TransportError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_device_is_transport_error() {
        let server = MockServer::start().await;
        let endpoint = endpoint(&server);
        drop(server);

        let outcome = ActionInvoker::new(Arc::new(transport()))
            .invoke(&endpoint, &get_binary_state())
            .await;

        assert!(matches!(
            outcome,
            ActionOutcome::TransportError(TransportError::ConnectionFailed(_))
        ));
    }
}
