// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker topics and the messages published on them.

use std::fmt;

use crate::command::ActorRequest;
use crate::protocol::ProtocolEvent;

/// A broker topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Inbound commands addressed to an actor.
    Actors,
    /// Inbound protocol events such as event notifications.
    Discovery,
}

impl Topic {
    /// Returns the topic name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Actors => "actors",
            Self::Discovery => "discovery",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message published on the broker.
///
/// The variant determines the topic, so a command can never be published
/// on the discovery topic by mistake.
#[derive(Debug, Clone)]
pub enum Message {
    /// A command for the `actors` topic.
    Actors(ActorRequest),
    /// A protocol event for the `discovery` topic.
    Discovery(ProtocolEvent),
}

impl Message {
    /// Returns the topic this message is published on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::Actors(_) => Topic::Actors,
            Self::Discovery(_) => Topic::Discovery,
        }
    }
}

impl From<ActorRequest> for Message {
    fn from(request: ActorRequest) -> Self {
        Self::Actors(request)
    }
}

impl From<ProtocolEvent> for Message {
    fn from(event: ProtocolEvent) -> Self {
        Self::Discovery(event)
    }
}
