// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GreenWave lighting gateways and their LED bulbs.
//!
//! The gateway does not event. Discovery polls it and hands the bulbs it
//! reported to [`LightingGateway::refresh`], which reconciles them against
//! the registry so every bulb keeps its identifier across refreshes. Bulbs
//! are commanded through the gateway.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::action::ActionInvoker;
use crate::broker::{HandlerId, Message, Topic};
use crate::capabilities::DeviceKind;
use crate::command::{ActorRequest, ValidationReport, optional_number, parse_params, require_text};
use crate::error::PerformError;
use crate::event::DeviceId;
use crate::manager::HubContext;
use crate::protocol::{ActionRequest, Endpoint, Transport};
use crate::registry::{ChildDevice, ChildReport, CompositeDeviceRegistry, RegistryStore};
use crate::state::{DeviceState, StateChange};
use crate::types::{OnOff, Percentage, Status, TaskId};

use super::{Actor, DeviceCore, parse_rename, settle, spawn_perform};

const LIGHTING: &str = "urn:greenwavereality-com:service:GOPLighting:1";
const LIGHTING_CONTROL: &str = "/upnp/control/lighting1";
const CHILD_SCOPE: &str = "bulbs";

/// A bulb as reported by one gateway poll.
///
/// `level` is in the bulb's own `[range_min, range_max]` range.
///
/// ```
/// use homehub_lib::device::BulbReport;
///
/// let bulb = BulbReport::new("216438", "Porch").with_level(true, 128).with_range(1, 255);
/// assert!(bulb.on);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulbReport {
    /// Identifier of the bulb on the gateway.
    pub local_id: String,
    /// Name stored on the gateway.
    pub name: String,
    /// Whether the bulb is lit.
    pub on: bool,
    /// Raw brightness level.
    pub level: u32,
    /// Lowest raw level.
    pub range_min: u32,
    /// Highest raw level.
    pub range_max: u32,
}

impl BulbReport {
    /// An unlit bulb with a `0..=100` range.
    #[must_use]
    pub fn new(local_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            name: name.into(),
            on: false,
            level: 0,
            range_min: 0,
            range_max: 100,
        }
    }

    /// Sets power and raw level.
    #[must_use]
    pub fn with_level(mut self, on: bool, level: u32) -> Self {
        self.on = on;
        self.level = level;
        self
    }

    /// Sets the raw level range.
    #[must_use]
    pub fn with_range(mut self, min: u32, max: u32) -> Self {
        self.range_min = min;
        self.range_max = max;
        self
    }

    fn brightness(&self) -> Percentage {
        Percentage::scaled_from(self.level, self.range_min, self.range_max)
    }

    fn to_child(&self) -> ChildReport {
        let status = if self.on { Status::On } else { Status::Off };
        ChildReport::new(
            self.local_id.clone(),
            self.name.clone(),
            DeviceKind::Led.whatami(),
            status,
        )
        .with_property("brightness", self.brightness().value())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum BulbCommand {
    Power(OnOff, Option<Percentage>),
    Rename(String),
}

impl BulbCommand {
    fn parse(perform: &str, parameter: Option<&str>) -> Result<Self, ValidationReport> {
        if perform == "off" {
            return Ok(Self::Power(OnOff::Off, None));
        }
        let params = parse_params(parameter)?;
        let mut report = ValidationReport::new();
        match perform {
            "on" => {
                let brightness = optional_number(&params, "brightness", &mut report)
                    .and_then(|level| match Percentage::from_f64(level) {
                        Ok(level) => Some(level),
                        Err(_) => {
                            report.invalidate("brightness");
                            None
                        }
                    });
                report.into_result()?;
                Ok(Self::Power(OnOff::On, brightness))
            }
            "set" => {
                let name = require_text(&params, "name", &mut report).map(str::to_string);
                report.into_result()?;
                name.map(Self::Rename)
                    .ok_or_else(|| ValidationReport::required_field("name"))
            }
            _ => Err(ValidationReport::invalid_field("perform")),
        }
    }
}

/// A GreenWave lighting gateway.
///
/// The gateway is `ready` after each successful refresh and `error` when a
/// poll failed. It can only be renamed, which happens locally; performs
/// addressed to one of its bulbs are carried out through the gateway.
pub struct LightingGateway<T, R> {
    core: DeviceCore,
    invoker: ActionInvoker<T>,
    registry: CompositeDeviceRegistry<R>,
    ranges: Mutex<BTreeMap<String, (u32, u32)>>,
}

impl<T: Transport, R: RegistryStore> LightingGateway<T, R> {
    pub(crate) fn start(
        ctx: &HubContext,
        transport: Arc<T>,
        store: Arc<R>,
        id: DeviceId,
        uid: &str,
        name: &str,
        endpoint: Endpoint,
    ) -> Arc<Self> {
        let core = DeviceCore::new(
            ctx,
            id,
            uid,
            DeviceKind::LightingGateway,
            endpoint,
            name,
            Status::Ready,
        );
        let registry =
            CompositeDeviceRegistry::new(store, ctx.events().clone(), id, uid, CHILD_SCOPE);
        let gateway = Arc::new(Self {
            core,
            invoker: ActionInvoker::new(transport),
            registry,
            ranges: Mutex::new(BTreeMap::new()),
        });
        gateway.core.hold(route_gateway(&gateway));
        gateway
    }

    pub(crate) fn core(&self) -> &DeviceCore {
        &self.core
    }

    /// Reconciles the bulbs of one gateway poll and returns every known
    /// bulb by local identifier.
    ///
    /// Bulbs missing from `bulbs` are kept.
    pub async fn refresh(&self, bulbs: Vec<BulbReport>) -> BTreeMap<String, ChildDevice> {
        {
            let mut ranges = self.ranges.lock();
            for bulb in &bulbs {
                ranges.insert(bulb.local_id.clone(), (bulb.range_min, bulb.range_max));
            }
        }
        let reports = bulbs.iter().map(BulbReport::to_child).collect();
        let children = self.registry.reconcile(reports).await;
        tracing::debug!(device = %self.core.id(), children = children.len(), "Gateway refreshed");

        self.core.set_status(Status::Ready);
        self.publish_children(&children);
        children
    }

    /// Records a failed gateway poll.
    pub fn fail(&self, diagnostic: &str) {
        tracing::error!(device = %self.core.id(), diagnostic, "Gateway poll failed");
        self.core.set_status(Status::Error);
    }

    fn publish_children(&self, children: &BTreeMap<String, ChildDevice>) {
        let summary: Vec<Value> = children
            .values()
            .map(|child| {
                let state = child.snapshot();
                json!({
                    "id": child.local_id(),
                    "deviceID": child.device_id().map(|id| id.value()),
                    "name": state.name(),
                    "status": state.status().as_str(),
                })
            })
            .collect();
        self.core
            .apply(&StateChange::property("children", Value::Array(summary)));
    }

    /// Every known bulb by local identifier.
    #[must_use]
    pub fn children(&self) -> BTreeMap<String, ChildDevice> {
        self.registry.children()
    }

    /// The bulb bound to `id`.
    #[must_use]
    pub fn child(&self, id: DeviceId) -> Option<ChildDevice> {
        self.registry.child_by_id(id)
    }

    /// Checks the arguments of a bulb perform.
    #[must_use]
    pub fn validate_child(&self, perform: &str, parameter: Option<&str>) -> ValidationReport {
        BulbCommand::parse(perform, parameter)
            .err()
            .unwrap_or_default()
    }

    /// Validates and carries out a perform addressed to `child`.
    ///
    /// # Errors
    ///
    /// Same as [`Actor::perform`].
    pub async fn perform_child(
        &self,
        task_id: &TaskId,
        child: &ChildDevice,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<(), PerformError> {
        let command = BulbCommand::parse(perform, parameter).map_err(PerformError::Invalid)?;
        let local_id = child.local_id();
        tracing::info!(
            device = %self.core.id(),
            child = local_id,
            task = %task_id,
            perform,
            "Bulb perform"
        );

        let (request, change) = match command {
            BulbCommand::Power(power, brightness) => {
                let mut request = ActionRequest::new(LIGHTING_CONTROL, LIGHTING, "SetBulbLevel")
                    .arg("DeviceID", local_id)
                    .arg("On", power.as_upnp());
                let mut changes = vec![StateChange::status(if power.is_on() {
                    Status::On
                } else {
                    Status::Off
                })];
                if let Some(brightness) = brightness {
                    let (min, max) = self
                        .ranges
                        .lock()
                        .get(local_id)
                        .copied()
                        .unwrap_or((0, 100));
                    request = request.arg("Level", brightness.scale_to(min, max).to_string());
                    changes.push(StateChange::property("brightness", brightness.value()));
                }
                (request, StateChange::batch(changes))
            }
            BulbCommand::Rename(name) => {
                let request = ActionRequest::new(LIGHTING_CONTROL, LIGHTING, "SetBulbName")
                    .arg("DeviceID", local_id)
                    .arg("Name", name.as_str());
                (request, StateChange::name(name))
            }
        };

        let outcome = self.invoker.invoke(self.core.endpoint(), &request).await;
        if settle(outcome)?.is_some() && self.registry.apply(local_id, &change) {
            self.publish_children(&self.registry.children());
        }
        Ok(())
    }

    pub(crate) fn shutdown(&self) {
        self.core.release();
    }
}

/// Routes `actors` requests to the gateway itself or to one of its bulbs.
fn route_gateway<T: Transport, R: RegistryStore>(
    gateway: &Arc<LightingGateway<T, R>>,
) -> HandlerId {
    let weak: Weak<LightingGateway<T, R>> = Arc::downgrade(gateway);
    gateway.core.broker().subscribe(Topic::Actors, move |message| {
        let Message::Actors(request) = message else {
            return;
        };
        let (Some(gateway), Some(target)) = (weak.upgrade(), request.target()) else {
            return;
        };
        if target == gateway.id() {
            spawn_perform(gateway, request.clone());
        } else if let Some(child) = gateway.child(target) {
            spawn_child_perform(gateway, child, request.clone());
        }
    })
}

fn spawn_child_perform<T: Transport, R: RegistryStore>(
    gateway: Arc<LightingGateway<T, R>>,
    child: ChildDevice,
    request: ActorRequest,
) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::warn!(task = %request.task_id(), "No runtime to run bulb perform on");
        return;
    };
    runtime.spawn(async move {
        let result = gateway
            .perform_child(
                request.task_id(),
                &child,
                request.perform_name(),
                request.parameter(),
            )
            .await;
        if let Err(err) = result {
            tracing::warn!(
                device = %gateway.id(),
                child = child.local_id(),
                task = %request.task_id(),
                error = %err,
                "Bulb perform rejected"
            );
        }
    });
}

impl<T: Transport, R: RegistryStore> Actor for LightingGateway<T, R> {
    fn id(&self) -> DeviceId {
        self.core.id()
    }

    fn kind(&self) -> DeviceKind {
        self.core.kind()
    }

    fn state(&self) -> DeviceState {
        self.core.snapshot()
    }

    fn validate(&self, perform: &str, parameter: Option<&str>) -> ValidationReport {
        parse_rename(perform, parameter).err().unwrap_or_default()
    }

    async fn perform(
        &self,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<(), PerformError> {
        let name = parse_rename(perform, parameter).map_err(PerformError::Invalid)?;
        tracing::info!(device = %self.core.id(), task = %task_id, name = %name, "Renamed");
        self.core.apply(&StateChange::name(name));
        Ok(())
    }
}

impl<T, R> fmt::Debug for LightingGateway<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightingGateway")
            .field("core", &self.core)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
