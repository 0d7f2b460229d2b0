// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state and change detection.
//!
//! [`DeviceState`] is the snapshot observers see. [`StateChange`] describes
//! what a device observed. [`DeviceStateStore`] applies changes and only
//! signals observers when a field actually differs.

mod device_state;
mod state_change;
mod store;

pub use device_state::DeviceState;
pub use state_change::StateChange;
pub use store::DeviceStateStore;
