// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device manager for coordinating every device of a hub.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, broadcast, watch};

use crate::capabilities::DeviceKind;
use crate::command::ValidationReport;
use crate::device::{BulbReport, Device, LightingGateway, SonosBridge, SonosSpeaker, WemoSwitch};
use crate::error::{Error, Result};
use crate::event::{DeviceEvent, DeviceId};
use crate::protocol::Transport;
use crate::registry::{ChildDevice, NewRecord, RegistryStore};
use crate::state::DeviceState;
use crate::types::TaskId;

use super::{DeviceInfo, HubContext};

/// A perform or query target: a device, or a bulb behind a gateway.
enum Target<T, R> {
    Device(Device<T, R>),
    Child(Arc<LightingGateway<T, R>>, ChildDevice),
}

/// Manager for every device of a hub.
///
/// Devices are keyed by the identifier the registry assigned to their UID,
/// so a device keeps its identifier across hub restarts. Gateway children
/// are reachable through the same calls as top-level devices.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use homehub_lib::manager::{DeviceInfo, DeviceManager};
/// use homehub_lib::protocol::HttpConfig;
/// use homehub_lib::registry::MemoryRegistry;
///
/// # #[tokio::main]
/// # async fn main() -> homehub_lib::Result<()> {
/// let transport = HttpConfig::new("http://127.0.0.1:3400/events").into_transport()?;
/// let hub = DeviceManager::new(Arc::new(transport), Arc::new(MemoryRegistry::new()));
///
/// let bridge = DeviceInfo::new("uuid:RINCON_B", "Sonos ZoneBridge ZB100", "http://192.168.1.30:1400/")
///     .with_name("Bridge");
/// let id = hub.discover(bridge).await?.expect("supported type");
/// assert_eq!(hub.state(id).await?.name(), "Bridge");
/// # Ok(())
/// # }
/// ```
pub struct DeviceManager<T, R> {
    ctx: HubContext,
    transport: Arc<T>,
    registry: Arc<R>,
    devices: RwLock<HashMap<DeviceId, Device<T, R>>>,
    /// Serializes UID resolution so a UID is never started twice.
    discovering: Mutex<()>,
    /// UIDs resolved and still starting.
    starting: parking_lot::Mutex<HashMap<String, DeviceId>>,
}

/// Holds a UID in `starting` until the device is inserted or the start is
/// abandoned.
struct Reservation<'a> {
    starting: &'a parking_lot::Mutex<HashMap<String, DeviceId>>,
    uid: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.starting.lock().remove(&self.uid);
    }
}

impl<T: Transport, R: RegistryStore> DeviceManager<T, R> {
    /// Creates a hub with a fresh broker, event bus and default
    /// configuration.
    #[must_use]
    pub fn new(transport: Arc<T>, registry: Arc<R>) -> Self {
        Self::with_context(HubContext::default(), transport, registry)
    }

    /// Creates a hub sharing `ctx`.
    #[must_use]
    pub fn with_context(ctx: HubContext, transport: Arc<T>, registry: Arc<R>) -> Self {
        Self {
            ctx,
            transport,
            registry,
            devices: RwLock::new(HashMap::new()),
            discovering: Mutex::new(()),
            starting: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// The context shared by every device of this hub.
    #[must_use]
    pub fn context(&self) -> &HubContext {
        &self.ctx
    }

    /// Subscribes to device events of every device.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.ctx.events().subscribe()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the device a discovery announcement describes.
    ///
    /// Returns the device identifier, or `None` for an unsupported type. An
    /// already known UID, or one still starting, is a no-op returning its
    /// identifier. Only UID resolution is serialized; devices start
    /// concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if the announced location is malformed or the
    /// registry cannot resolve the UID.
    pub async fn discover(&self, info: DeviceInfo) -> Result<Option<DeviceId>> {
        let Some(kind) = info.kind() else {
            tracing::debug!(uid = %info.uid, device_type = %info.device_type, "Unsupported device type");
            return Ok(None);
        };
        let (id, name, endpoint, _reservation) = {
            let _serial = self.discovering.lock().await;

            if let Some(id) = self.find_uid(&info.uid).await {
                return Ok(Some(id));
            }
            if let Some(id) = self.starting.lock().get(&info.uid) {
                return Ok(Some(*id));
            }

            let endpoint = info.endpoint()?;
            let (id, name) = self.resolve(&info, kind).await?;
            self.starting.lock().insert(info.uid.clone(), id);
            let reservation = Reservation {
                starting: &self.starting,
                uid: info.uid.clone(),
            };
            (id, name, endpoint, reservation)
        };

        let transport = Arc::clone(&self.transport);
        let device = match kind {
            DeviceKind::WemoSwitch => Device::Wemo(
                WemoSwitch::start(&self.ctx, transport, id, &info.uid, &name, endpoint).await,
            ),
            DeviceKind::SonosSpeaker => Device::SonosSpeaker(
                SonosSpeaker::start(&self.ctx, transport, id, &info.uid, &name, endpoint).await,
            ),
            DeviceKind::SonosBridge => Device::SonosBridge(SonosBridge::start(
                &self.ctx, id, &info.uid, &name, endpoint,
            )),
            DeviceKind::LightingGateway => Device::LightingGateway(LightingGateway::start(
                &self.ctx,
                transport,
                Arc::clone(&self.registry),
                id,
                &info.uid,
                &name,
                endpoint,
            )),
            DeviceKind::Led => return Ok(None),
        };

        self.devices.write().await.insert(id, device);
        self.ctx
            .events()
            .publish(DeviceEvent::DeviceAdded { device_id: id });
        tracing::info!(device = %id, uid = %info.uid, kind = %kind, "Device added");
        Ok(Some(id))
    }

    /// Finds or creates the registry record of a top-level device.
    async fn resolve(&self, info: &DeviceInfo, kind: DeviceKind) -> Result<(DeviceId, String)> {
        if let Some(record) = self.registry.lookup(&info.uid).await? {
            let name = if record.name.is_empty() {
                info.display_name().to_string()
            } else {
                record.name
            };
            return Ok((record.id, name));
        }

        let name = info.display_name().to_string();
        let record = NewRecord {
            name: name.clone(),
            whatami: kind.whatami().to_string(),
            parent: None,
        };
        let id = self.registry.create(&info.uid, record).await?;
        Ok((id, name))
    }

    async fn find_uid(&self, uid: &str) -> Option<DeviceId> {
        self.devices
            .read()
            .await
            .values()
            .find(|device| device.uid() == uid)
            .map(Device::id)
    }

    /// Tears a device down and forgets it.
    ///
    /// Returns `true` if the device was known.
    pub async fn remove(&self, device_id: DeviceId) -> bool {
        let Some(device) = self.devices.write().await.remove(&device_id) else {
            return false;
        };
        self.tear_down(device_id, device).await;
        tracing::info!(device = %device_id, "Device removed");
        true
    }

    /// Tears every device down.
    pub async fn shutdown(&self) {
        let devices: Vec<_> = self.devices.write().await.drain().collect();
        for (device_id, device) in devices {
            self.tear_down(device_id, device).await;
        }
    }

    /// Shuts `device` down and announces its removal, along with the bound
    /// bulbs of a gateway.
    async fn tear_down(&self, device_id: DeviceId, device: Device<T, R>) {
        let children: Vec<DeviceId> = match &device {
            Device::LightingGateway(gateway) => gateway
                .children()
                .values()
                .filter_map(ChildDevice::device_id)
                .collect(),
            _ => Vec::new(),
        };
        device.shutdown().await;

        let events = self.ctx.events();
        for child in children {
            events.publish(DeviceEvent::DeviceRemoved { device_id: child });
        }
        events.publish(DeviceEvent::DeviceRemoved { device_id });
    }

    // =========================================================================
    // Gateways
    // =========================================================================

    /// Hands the bulbs of one gateway poll to the gateway `device_id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if `device_id` is not a lighting
    /// gateway.
    pub async fn refresh_gateway(
        &self,
        device_id: DeviceId,
        bulbs: Vec<BulbReport>,
    ) -> Result<BTreeMap<String, ChildDevice>> {
        let gateway = self.gateway(device_id).await.ok_or(Error::DeviceNotFound)?;
        Ok(gateway.refresh(bulbs).await)
    }

    /// Records a failed poll of the gateway `device_id`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` if `device_id` is not a lighting
    /// gateway.
    pub async fn gateway_failed(&self, device_id: DeviceId, diagnostic: &str) -> Result<()> {
        let gateway = self.gateway(device_id).await.ok_or(Error::DeviceNotFound)?;
        gateway.fail(diagnostic);
        Ok(())
    }

    async fn gateway(&self, device_id: DeviceId) -> Option<Arc<LightingGateway<T, R>>> {
        match self.devices.read().await.get(&device_id) {
            Some(Device::LightingGateway(gateway)) => Some(Arc::clone(gateway)),
            _ => None,
        }
    }

    async fn target(&self, device_id: DeviceId) -> Result<Target<T, R>> {
        let devices = self.devices.read().await;
        if let Some(device) = devices.get(&device_id) {
            return Ok(Target::Device(device.clone()));
        }
        devices
            .values()
            .find_map(|device| match device {
                Device::LightingGateway(gateway) => gateway
                    .child(device_id)
                    .map(|child| Target::Child(Arc::clone(gateway), child)),
                _ => None,
            })
            .ok_or(Error::DeviceNotFound)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Identifiers of every device, bound gateway children included, in
    /// ascending order.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        let devices = self.devices.read().await;
        let mut ids: Vec<DeviceId> = devices.keys().copied().collect();
        for device in devices.values() {
            if let Device::LightingGateway(gateway) = device {
                ids.extend(gateway.children().values().filter_map(ChildDevice::device_id));
            }
        }
        ids.sort_unstable();
        ids
    }

    /// The top-level device `device_id`.
    pub async fn device(&self, device_id: DeviceId) -> Option<Device<T, R>> {
        self.devices.read().await.get(&device_id).cloned()
    }

    /// Current state of a device or gateway child.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown identifier.
    pub async fn state(&self, device_id: DeviceId) -> Result<DeviceState> {
        Ok(match self.target(device_id).await? {
            Target::Device(device) => device.state(),
            Target::Child(_, child) => child.snapshot(),
        })
    }

    /// Returns a receiver that always holds the latest state of a
    /// top-level device.
    pub async fn watch(&self, device_id: DeviceId) -> Option<watch::Receiver<DeviceState>> {
        self.devices
            .read()
            .await
            .get(&device_id)
            .map(Device::watch)
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Checks perform arguments without contacting the device.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown identifier.
    pub async fn validate(
        &self,
        device_id: DeviceId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<ValidationReport> {
        Ok(match self.target(device_id).await? {
            Target::Device(device) => device.validate(perform, parameter),
            Target::Child(gateway, _) => gateway.validate_child(perform, parameter),
        })
    }

    /// Validates and carries out a perform on a device or gateway child.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceNotFound` for an unknown identifier and
    /// `Error::Perform` when the perform is rejected.
    pub async fn perform(
        &self,
        device_id: DeviceId,
        task_id: &TaskId,
        perform: &str,
        parameter: Option<&str>,
    ) -> Result<()> {
        match self.target(device_id).await? {
            Target::Device(device) => device.perform(task_id, perform, parameter).await?,
            Target::Child(gateway, child) => {
                gateway
                    .perform_child(task_id, &child, perform, parameter)
                    .await?;
            }
        }
        Ok(())
    }
}

impl<T, R> std::fmt::Debug for DeviceManager<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}
