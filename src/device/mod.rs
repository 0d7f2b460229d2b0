// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device families behind one command and state interface.
//!
//! Every supported family implements [`Actor`]: it validates perform
//! arguments, carries performs out and exposes its current state. The
//! closed set of families is the [`Device`] enum; the hub dispatches on its
//! variant, never on the shape of a device.
//!
//! Each device owns a [`DeviceStateStore`] and registers its own broker
//! handlers when it starts. Handlers hold weak references only, so a torn
//! down device is never kept alive by the broker. Teardown deregisters
//! them.
//!
//! | Family | Event path | Polling |
//! |--------|------------|---------|
//! | [`WemoSwitch`] | `/upnp/event/basicevent1` | no |
//! | [`SonosSpeaker`] | `/MediaRenderer/AVTransport/Event` | volume, mute, position |
//! | [`SonosBridge`] | none | no |
//! | [`LightingGateway`] | none, refreshed by discovery | no |

mod greenwave;
mod sonos;
#[cfg(test)]
pub(crate) mod testing;
mod wemo;

pub use greenwave::{BulbReport, LightingGateway};
pub use sonos::{SonosBridge, SonosSpeaker};
pub use wemo::WemoSwitch;

use std::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::action::{ActionOutcome, ActionPayload};
use crate::broker::{Broker, HandlerId, Message, Topic};
use crate::capabilities::{Capabilities, DeviceKind};
use crate::command::{ActorRequest, ValidationReport, parse_params, require_text};
use crate::error::PerformError;
use crate::event::DeviceId;
use crate::manager::HubContext;
use crate::protocol::gena::Notification;
use crate::protocol::{Endpoint, Transport};
use crate::registry::RegistryStore;
use crate::state::{DeviceState, DeviceStateStore, StateChange};
use crate::types::{Status, TaskId};

/// Shared command and state interface of every device family.
pub trait Actor: Send + Sync + 'static {
    /// Hub identifier.
    fn id(&self) -> DeviceId;

    /// Family of this device.
    fn kind(&self) -> DeviceKind;

    /// Current state snapshot.
    fn state(&self) -> DeviceState;

    /// Checks perform arguments without touching the network.
    fn validate(&self, perform: &str, parameter: Option<&str>) -> ValidationReport;

    /// Validates and carries out a perform.
    ///
    /// Transport failures are logged and retried by the device's own
    /// machinery; they do not reject the perform.
    ///
    /// # Errors
    ///
    /// Returns `PerformError::Invalid` if validation fails, before any
    /// network call, and `PerformError::Fault` if the device reported
    /// faults.
    fn perform(
        &self,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> impl Future<Output = Result<(), PerformError>> + Send;
}

/// Identity, state and broker registrations shared by every family.
#[derive(Debug)]
pub(crate) struct DeviceCore {
    id: DeviceId,
    uid: String,
    kind: DeviceKind,
    endpoint: Endpoint,
    store: Arc<DeviceStateStore>,
    broker: Arc<Broker>,
    handlers: Mutex<Vec<HandlerId>>,
}

impl DeviceCore {
    pub(crate) fn new(
        ctx: &HubContext,
        id: DeviceId,
        uid: &str,
        kind: DeviceKind,
        endpoint: Endpoint,
        name: &str,
        status: Status,
    ) -> Self {
        let initial = DeviceState::new(name, kind.whatami(), status);
        Self {
            id,
            uid: uid.to_string(),
            kind,
            endpoint,
            store: Arc::new(DeviceStateStore::new(id, initial, ctx.events().clone())),
            broker: Arc::clone(ctx.broker()),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> DeviceId {
        self.id
    }

    pub(crate) fn uid(&self) -> &str {
        &self.uid
    }

    pub(crate) fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub(crate) fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub(crate) fn store(&self) -> &Arc<DeviceStateStore> {
        &self.store
    }

    pub(crate) fn broker(&self) -> &Broker {
        &self.broker
    }

    pub(crate) fn snapshot(&self) -> DeviceState {
        self.store.snapshot()
    }

    pub(crate) fn status(&self) -> Status {
        self.store.snapshot().status()
    }

    pub(crate) fn apply(&self, change: &StateChange) -> bool {
        self.store.apply(change)
    }

    pub(crate) fn set_status(&self, status: Status) -> bool {
        self.store.apply(&StateChange::status(status))
    }

    /// Keeps a broker registration until [`release`](Self::release).
    pub(crate) fn hold(&self, handler: HandlerId) {
        self.handlers.lock().push(handler);
    }

    /// Deregisters every broker handler of this device.
    pub(crate) fn release(&self) {
        let handlers = std::mem::take(&mut *self.handlers.lock());
        for handler in handlers {
            self.broker.unsubscribe(handler);
        }
    }
}

impl Drop for DeviceCore {
    fn drop(&mut self) {
        self.release();
    }
}

/// Registers an `actors` handler running performs addressed to `actor`.
///
/// The perform runs on its own task, so the broker returns immediately; a
/// rejection is logged.
pub(crate) fn route_actors<A: Actor>(broker: &Broker, actor: &Arc<A>) -> HandlerId {
    let weak: Weak<A> = Arc::downgrade(actor);
    broker.subscribe(Topic::Actors, move |message| {
        let Message::Actors(request) = message else {
            return;
        };
        let Some(actor) = weak.upgrade() else {
            return;
        };
        if request.target() == Some(actor.id()) {
            spawn_perform(actor, request.clone());
        }
    })
}

pub(crate) fn spawn_perform<A: Actor>(actor: Arc<A>, request: ActorRequest) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(
            device = %actor.id(),
            task = %request.task_id(),
            "No runtime to run perform on"
        );
        return;
    };
    runtime.spawn(async move {
        let result = actor
            .perform(
                request.task_id(),
                request.perform_name(),
                request.parameter(),
            )
            .await;
        if let Err(err) = result {
            tracing::warn!(
                device = %actor.id(),
                task = %request.task_id(),
                perform = request.perform_name(),
                error = %err,
                "Perform rejected"
            );
        }
    });
}

/// Registers a `discovery` handler receiving every `NOTIFY` as a
/// [`Notification`].
///
/// The handler sees notifications for all devices and must check them
/// against its own lease.
pub(crate) fn route_notifications<F>(broker: &Broker, handle: F) -> HandlerId
where
    F: Fn(&Notification) + Send + Sync + 'static,
{
    broker.subscribe(Topic::Discovery, move |message| {
        let Message::Discovery(event) = message else {
            return;
        };
        if !event.method().eq_ignore_ascii_case("NOTIFY") {
            return;
        }
        match Notification::from_event(event) {
            Ok(notification) => handle(&notification),
            Err(err) => tracing::debug!(path = event.path(), error = %err, "Unusable NOTIFY"),
        }
    })
}

/// Turns an action outcome into a perform result.
///
/// Faults reject the perform. A transport failure has already been logged
/// by the invoker and yields `Ok(None)`.
pub(crate) fn settle(outcome: ActionOutcome) -> Result<Option<ActionPayload>, PerformError> {
    match outcome {
        ActionOutcome::Success(payload) => Ok(Some(payload)),
        ActionOutcome::ProtocolFault(faults) => Err(PerformError::Fault(faults)),
        ActionOutcome::TransportError(_) => Ok(None),
    }
}

/// Decodes a `set{name}` perform, the only one a gateway accepts itself.
pub(crate) fn parse_rename(perform: &str, parameter: Option<&str>) -> Result<String, ValidationReport> {
    if perform != "set" {
        return Err(ValidationReport::invalid_field("perform"));
    }
    let params = parse_params(parameter)?;
    let mut report = ValidationReport::new();
    let name = require_text(&params, "name", &mut report).map(str::to_string);
    report.into_result()?;
    name.ok_or_else(|| ValidationReport::required_field("name"))
}

/// A device of one of the supported families.
#[derive(Debug)]
pub enum Device<T, R> {
    /// Wemo on/off switch.
    Wemo(Arc<WemoSwitch<T>>),
    /// Sonos zone player.
    SonosSpeaker(Arc<SonosSpeaker<T>>),
    /// Sonos zone bridge.
    SonosBridge(Arc<SonosBridge>),
    /// GreenWave lighting gateway.
    LightingGateway(Arc<LightingGateway<T, R>>),
}

impl<T, R> Clone for Device<T, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Wemo(device) => Self::Wemo(Arc::clone(device)),
            Self::SonosSpeaker(device) => Self::SonosSpeaker(Arc::clone(device)),
            Self::SonosBridge(device) => Self::SonosBridge(Arc::clone(device)),
            Self::LightingGateway(device) => Self::LightingGateway(Arc::clone(device)),
        }
    }
}

impl<T: Transport, R: RegistryStore> Device<T, R> {
    /// Hub identifier.
    #[must_use]
    pub fn id(&self) -> DeviceId {
        match self {
            Self::Wemo(device) => device.id(),
            Self::SonosSpeaker(device) => device.id(),
            Self::SonosBridge(device) => device.id(),
            Self::LightingGateway(device) => device.id(),
        }
    }

    /// Family of this device.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        match self {
            Self::Wemo(device) => device.kind(),
            Self::SonosSpeaker(device) => device.kind(),
            Self::SonosBridge(device) => device.kind(),
            Self::LightingGateway(device) => device.kind(),
        }
    }

    /// Capabilities of the family.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        match self {
            Self::Wemo(device) => device.state(),
            Self::SonosSpeaker(device) => device.state(),
            Self::SonosBridge(device) => device.state(),
            Self::LightingGateway(device) => device.state(),
        }
    }

    /// Returns a receiver that always holds the latest state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<DeviceState> {
        self.core().store().watch()
    }

    /// Checks perform arguments.
    #[must_use]
    pub fn validate(&self, perform: &str, parameter: Option<&str>) -> ValidationReport {
        match self {
            Self::Wemo(device) => device.validate(perform, parameter),
            Self::SonosSpeaker(device) => device.validate(perform, parameter),
            Self::SonosBridge(device) => device.validate(perform, parameter),
            Self::LightingGateway(device) => device.validate(perform, parameter),
        }
    }

    /// Validates and carries out a perform.
    ///
    /// # Errors
    ///
    /// See [`Actor::perform`].
    pub async fn perform(
        &self,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<(), PerformError> {
        match self {
            Self::Wemo(device) => device.perform(task_id, perform, parameter).await,
            Self::SonosSpeaker(device) => device.perform(task_id, perform, parameter).await,
            Self::SonosBridge(device) => device.perform(task_id, perform, parameter).await,
            Self::LightingGateway(device) => device.perform(task_id, perform, parameter).await,
        }
    }

    /// Stops timers and leases and deregisters broker handlers.
    pub async fn shutdown(&self) {
        match self {
            Self::Wemo(device) => device.shutdown().await,
            Self::SonosSpeaker(device) => device.shutdown().await,
            Self::SonosBridge(device) => device.shutdown(),
            Self::LightingGateway(device) => device.shutdown(),
        }
    }

    fn core(&self) -> &DeviceCore {
        match self {
            Self::Wemo(device) => device.core(),
            Self::SonosSpeaker(device) => device.core(),
            Self::SonosBridge(device) => device.core(),
            Self::LightingGateway(device) => device.core(),
        }
    }

    /// Stable identifier announced by discovery.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.core().uid()
    }
}
