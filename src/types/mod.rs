// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared by the device families.
//!
//! - [`Percentage`] - Brightness or volume (0-100%)
//! - [`OnOff`] - Binary on/off values
//! - [`PlayMode`] - Media play modes
//! - [`Status`] - Device status values
//! - [`TaskId`] - Identifier of a performed command

mod percentage;
mod play_mode;
mod power;
mod status;
mod task_id;

pub use percentage::Percentage;
pub use play_mode::PlayMode;
pub use power::OnOff;
pub use status::Status;
pub use task_id::TaskId;
