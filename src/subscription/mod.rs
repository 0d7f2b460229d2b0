// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Push-style event subscriptions.
//!
//! Devices that support GENA eventing hold one
//! [`SubscriptionLeaseManager`] per event service. The manager keeps the
//! lease alive in the background and decides which inbound notifications
//! are current:
//!
//! ```text
//! Unsubscribed -> Subscribing -> Active -> Renewing -> Active ...
//!                     ^  |                    |
//!                     |  v                    v
//!                     Error <------------ (failures)
//! ```
//!
//! Every successful subscribe issues a new identifier; notifications
//! carrying an older one are rejected even if their sequence number would
//! be acceptable.

mod lease;

pub use lease::{Delivery, LeaseState, SubscriptionLeaseManager};
