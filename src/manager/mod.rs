// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The hub: one entry point over every discovered device.
//!
//! The [`DeviceManager`] turns discovery announcements into running
//! devices, gives each a stable identifier from the registry and routes
//! commands and queries to them. Devices share one [`HubContext`]: the
//! broker they register handlers on, the event bus they publish state on,
//! and the configuration.
//!
//! # Examples
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
//!     let transport = HttpConfig::new("http://192.168.1.2:3400/events").into_transport()?;
//!     let hub = DeviceManager::new(Arc::new(transport), Arc::new(MemoryRegistry::new()));
//!
//!     let mut events = hub.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{event:?}");
//!         }
//!     });
//!
//!     let info = DeviceInfo::new(
//!         "uuid:Socket-1_0-221517K0101769",
//!         "urn:Belkin:device:controllee:1",
//!         "http://192.168.1.40:49153/setup.xml",
//!     )
//!     .with_name("Desk lamp");
//!     if let Some(id) = hub.discover(info).await? {
//!         hub.perform(id, &TaskId::new("task-1"), "on", None).await?;
//!     }
//!
//!     hub.shutdown().await;
//!     Ok(())
//! }
//! ```

mod device_info;
mod device_manager;

pub use device_info::DeviceInfo;
pub use device_manager::DeviceManager;

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::HubConfig;
use crate::event::EventBus;

/// What every device of a hub shares.
///
/// Created once per hub and passed to every device constructor.
#[derive(Debug, Clone, Default)]
pub struct HubContext {
    broker: Arc<Broker>,
    events: EventBus,
    config: HubConfig,
}

impl HubContext {
    /// Bundles a broker, an event bus and a configuration.
    #[must_use]
    pub fn new(broker: Arc<Broker>, events: EventBus, config: HubConfig) -> Self {
        Self {
            broker,
            events,
            config,
        }
    }

    /// A fresh broker and event bus with `config`.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The broker devices register their handlers on.
    #[must_use]
    pub fn broker(&self) -> &Arc<Broker> {
        &self.broker
    }

    /// The bus device events are published on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Hub configuration.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}
