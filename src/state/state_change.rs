// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Partial updates to a device state.
//!
//! Both the push path (event notifications) and the pull path (polling,
//! action replies) describe what they observed as a [`StateChange`]. They
//! routinely report values the state already holds; applying such a change
//! is a no-op.
//!
//! ```
//! use homehub_lib::state::StateChange;
//! use homehub_lib::types::Status;
//! use serde_json::json;
//!
//! let observed = StateChange::batch([
//!     StateChange::status(Status::Playing),
//!     StateChange::property("volume", json!(30)),
//! ]);
//! assert!(!observed.is_empty());
//! ```

use serde_json::Value;

use crate::types::Status;

/// One observed change, or a batch of them.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// Display name changed.
    Name(String),
    /// Status changed.
    Status(Status),
    /// A property was set.
    Property {
        /// Property name.
        key: String,
        /// New value.
        value: Value,
    },
    /// A property disappeared.
    RemoveProperty(String),
    /// Several changes observed together.
    Batch(Vec<StateChange>),
}

impl StateChange {
    /// Creates a name change.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Creates a status change.
    #[must_use]
    pub const fn status(status: Status) -> Self {
        Self::Status(status)
    }

    /// Creates a property change.
    #[must_use]
    pub fn property(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Property {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Groups changes.
    #[must_use]
    pub fn batch(changes: impl IntoIterator<Item = StateChange>) -> Self {
        Self::Batch(changes.into_iter().collect())
    }

    /// Returns `true` for a batch with nothing in it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Batch(changes) => changes.iter().all(Self::is_empty),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_empty_batch_is_empty() {
        let change = StateChange::batch([StateChange::batch([])]);
        assert!(change.is_empty());
    }

    #[test]
    fn property_accepts_plain_values() {
        let change = StateChange::property("brightness", 40);
        assert_eq!(
            change,
            StateChange::Property {
                key: "brightness".into(),
                value: Value::from(40)
            }
        );
    }
}
