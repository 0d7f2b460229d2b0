// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands published on the `actors` topic.

use serde::{Deserialize, Serialize};

use crate::event::DeviceId;
use crate::types::TaskId;

/// Request kind of an [`ActorRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Carry out a perform.
    Perform,
}

/// A command addressed to one actor.
///
/// `parameter` is the raw JSON text supplied by the caller. Each device
/// family decodes it during validation.
///
/// ```
/// use homehub_lib::command::ActorRequest;
/// use homehub_lib::event::DeviceId;
///
/// let request = ActorRequest::perform("device/3", "t-1", "set", Some(r#"{"name":"Den"}"#));
/// assert_eq!(request.target(), Some(DeviceId::new(3)));
/// assert_eq!(request.perform_name(), "set");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    request: RequestKind,
    #[serde(rename = "taskID")]
    task_id: TaskId,
    #[serde(rename = "actorID")]
    actor: String,
    perform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameter: Option<String>,
}

impl ActorRequest {
    /// Creates a perform request.
    #[must_use]
    pub fn perform(
        actor: impl Into<String>,
        task_id: impl Into<TaskId>,
        perform: impl Into<String>,
        parameter: Option<&str>,
    ) -> Self {
        Self {
            request: RequestKind::Perform,
            task_id: task_id.into(),
            actor: actor.into(),
            perform: perform.into(),
            parameter: parameter.map(str::to_string),
        }
    }

    /// Request kind.
    #[must_use]
    pub fn request(&self) -> RequestKind {
        self.request
    }

    /// Task identifier chosen by the caller.
    #[must_use]
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Actor address, `device/<id>` for devices.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Name of the perform.
    #[must_use]
    pub fn perform_name(&self) -> &str {
        &self.perform
    }

    /// Raw JSON parameter.
    #[must_use]
    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    /// The device this request is addressed to, if the actor is a device.
    #[must_use]
    pub fn target(&self) -> Option<DeviceId> {
        DeviceId::from_actor(&self.actor)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        TaskId::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_device_actor_has_no_target() {
        let request = ActorRequest::perform("place/1", "t", "on", None);
        assert_eq!(request.target(), None);
    }

    #[test]
    fn deserializes_wire_names() {
        let request: ActorRequest = serde_json::from_str(
            r#"{"request":"perform","taskID":"42","actorID":"device/7","perform":"off"}"#,
        )
        .unwrap();
        assert_eq!(request.task_id().as_str(), "42");
        assert_eq!(request.target(), Some(DeviceId::new(7)));
        assert_eq!(request.parameter(), None);
    }
}
