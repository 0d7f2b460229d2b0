// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `homehub_lib` - the device-event synchronization core of a home hub.
//!
//! The library keeps a live model of devices on the local network and lets
//! callers command them through one interface, whatever protocol each
//! device family speaks.
//!
//! # What it does
//!
//! - **Event leases**: UPnP GENA subscriptions are acquired, renewed before
//!   they lapse and retried with backoff ([`subscription`])
//! - **Ordered delivery**: stale and duplicate notifications are dropped by
//!   sequence number
//! - **Control actions**: SOAP actions are sent and faults embedded in
//!   otherwise successful replies are surfaced ([`action`])
//! - **Routing**: commands and network events reach the right device
//!   through a topic broker ([`broker`])
//! - **Stable identities**: gateway children keep their identifiers across
//!   refreshes ([`registry`])
//! - **Change detection**: observers only see genuine state transitions
//!   ([`state`], [`event`])
//!
//! # Supported devices
//!
//! - Belkin Wemo switches
//! - Sonos zone players and bridges
//! - GreenWave lighting gateways and their LED bulbs
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use homehub_lib::manager::{DeviceInfo, DeviceManager};
//! use homehub_lib::protocol::HttpConfig;
//! use homehub_lib::registry::MemoryRegistry;
//! use homehub_lib::types::TaskId;
//!
//! #[tokio::main]
//! async fn main() -> homehub_lib::Result<()> {
//!     // Devices send their NOTIFY requests to this URL. The embedder runs
//!     // the listener and publishes each request on the hub's broker.
//!     let transport = HttpConfig::new("http://192.168.1.2:3400/events").into_transport()?;
//!     let hub = DeviceManager::new(Arc::new(transport), Arc::new(MemoryRegistry::new()));
//!
//!     let speaker = DeviceInfo::new(
//!         "uuid:RINCON_000E58A0C0FE01400",
//!         "urn:schemas-upnp-org:device:ZonePlayer:1",
//!         "http://192.168.1.31:1400/xml/device_description.xml",
//!     );
//!     if let Some(id) = hub.discover(speaker).await? {
//!         hub.perform(id, &TaskId::new("task-1"), "set", Some(r#"{"volume":20}"#))
//!             .await?;
//!         println!("{:?}", hub.state(id).await?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Inbound events
//!
//! The hub does not listen on the network. The embedder forwards each
//! inbound request to the broker as a [`broker::Message::Discovery`] and
//! every device picks up the notifications of its own lease:
//!
//! ```no_run
//! use homehub_lib::broker::{Broker, Message};
//! use homehub_lib::protocol::ProtocolEvent;
//!
//! # fn forward(broker: &Broker) {
//! let event = ProtocolEvent::new("NOTIFY", "/events")
//!     .with_header("SID", "uuid:a9f3c5e2-0001")
//!     .with_header("SEQ", "4")
//!     .with_content("<e:propertyset xmlns:e=\"urn:schemas-upnp-org:event-1-0\"/>");
//! broker.publish(&Message::Discovery(event));
//! # }
//! ```

pub mod action;
pub mod broker;
mod capabilities;
pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod schedule;
pub mod state;
pub mod subscription;
pub mod types;

pub use capabilities::{Capabilities, DeviceKind};
pub use command::{ActorRequest, ValidationReport};
pub use config::{HubConfig, LeaseConfig, PollConfig};
pub use device::{Actor, Device};
pub use error::{Error, ParseError, PerformError, Result, StorageError, TransportError, ValueError};
pub use event::{DeviceEvent, DeviceId, EventBus};
pub use manager::{DeviceInfo, DeviceManager, HubContext};
#[cfg(feature = "http")]
pub use protocol::{HttpConfig, HttpTransport};
pub use protocol::{Endpoint, Transport};
pub use state::{DeviceState, StateChange};
pub use subscription::{LeaseState, SubscriptionLeaseManager};
