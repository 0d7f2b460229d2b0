// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer-facing event stream.
//!
//! Devices publish a [`DeviceEvent`] on the hub's [`EventBus`] when they come
//! online, when they are torn down, and whenever their state genuinely
//! changes.
//!
//! # Examples
//!
//! ```
//! use homehub_lib::event::{DeviceId, DeviceEvent, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(DeviceEvent::DeviceAdded { device_id: DeviceId::new(1) });
//! assert!(rx.try_recv().is_ok());
//! ```

mod device_event;
mod device_id;
mod event_bus;

pub use device_event::DeviceEvent;
pub use device_id::DeviceId;
pub use event_bus::EventBus;
