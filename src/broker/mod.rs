// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic-based publish/subscribe hub.
//!
//! The broker decouples inbound traffic from the devices that handle it.
//! Commands arrive on [`Topic::Actors`] and event notifications on
//! [`Topic::Discovery`]; every device registers one handler per topic when
//! it is built and deregisters them on teardown.
//!
//! The broker does not route by identity. Every handler of a topic sees
//! every message and ignores the ones not addressed to it.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use homehub_lib::broker::{Broker, Message, Topic};
//! use homehub_lib::command::ActorRequest;
//!
//! let broker = Broker::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! let id = broker.subscribe(Topic::Actors, move |message| {
//!     if let Message::Actors(request) = message {
//!         if request.actor() == "device/1" {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! });
//!
//! broker.publish(&ActorRequest::perform("device/1", "t1", "on", None).into());
//! broker.publish(&ActorRequest::perform("device/2", "t2", "on", None).into());
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//!
//! assert!(broker.unsubscribe(id));
//! ```

mod topic;

pub use topic::{Message, Topic};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

/// Handle returned by [`Broker::subscribe`], used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({})", self.0)
    }
}

type Handler = Arc<dyn Fn(&Message) + Send + Sync>;

/// Handlers of one topic, in registration order.
type HandlerList = RwLock<Vec<(HandlerId, Handler)>>;

/// The hub's publish/subscribe broker.
///
/// One broker exists per running hub; it is created with the
/// [`HubContext`](crate::manager::HubContext) and handed to every device.
///
/// Delivery is synchronous: [`publish`](Self::publish) runs every handler
/// registered on the topic, in registration order, before it returns.
/// Nothing is queued, so a handler registered after a publish never sees
/// that message. Handlers may subscribe or unsubscribe from inside a
/// callback; such changes take effect from the next publish.
pub struct Broker {
    next_id: AtomicU64,
    actors: HandlerList,
    discovery: HandlerList,
}

impl Broker {
    /// Creates a broker with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            actors: RwLock::new(Vec::new()),
            discovery: RwLock::new(Vec::new()),
        }
    }

    fn handlers(&self, topic: Topic) -> &HandlerList {
        match topic {
            Topic::Actors => &self.actors,
            Topic::Discovery => &self.discovery,
        }
    }

    /// Registers a handler for `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> HandlerId
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers(topic).write().push((id, Arc::new(handler)));
        tracing::trace!(topic = %topic, handler = %id, "Handler registered");
        id
    }

    /// Deregisters a handler from whichever topic holds it.
    ///
    /// Returns `true` if a handler was found and removed.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        [Topic::Actors, Topic::Discovery].into_iter().any(|topic| {
            let mut handlers = self.handlers(topic).write();
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            handlers.len() != before
        })
    }

    /// Delivers `message` to every handler of its topic.
    ///
    /// The handler list is snapshotted first, so no lock is held while
    /// handlers run.
    pub fn publish(&self, message: &Message) {
        let topic = message.topic();
        let handlers: Vec<Handler> = self
            .handlers(topic)
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        tracing::trace!(topic = %topic, handlers = handlers.len(), "Publishing");
        for handler in handlers {
            handler(message);
        }
    }

    /// Returns the number of handlers registered on `topic`.
    #[must_use]
    pub fn handler_count(&self, topic: Topic) -> usize {
        self.handlers(topic).read().len()
    }

    /// Removes every handler.
    pub fn clear(&self) {
        self.actors.write().clear();
        self.discovery.write().clear();
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("actors", &self.handler_count(Topic::Actors))
            .field("discovery", &self.handler_count(Topic::Discovery))
            .finish_non_exhaustive()
    }
}
