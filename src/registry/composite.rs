// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of gateway children against the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::event::{DeviceEvent, DeviceId, EventBus};
use crate::state::{DeviceState, DeviceStateStore, StateChange};
use crate::types::Status;

use super::{NewRecord, RegistryStore};

/// Stable identity of a child: the gateway UID, an optional scope and the
/// identifier the gateway uses locally.
///
/// ```
/// use homehub_lib::registry::CompositeKey;
///
/// assert_eq!(CompositeKey::new("gw-7", "3").to_string(), "gw-7/3");
/// assert_eq!(CompositeKey::scoped("gw-7", "bulbs", "3").to_string(), "gw-7/bulbs/3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    prefix: String,
    local_id: String,
}

impl CompositeKey {
    /// Key `parent/local`.
    #[must_use]
    pub fn new(parent_uid: &str, local_id: &str) -> Self {
        Self {
            prefix: parent_uid.to_string(),
            local_id: local_id.to_string(),
        }
    }

    /// Key `parent/scope/local`.
    #[must_use]
    pub fn scoped(parent_uid: &str, scope: &str, local_id: &str) -> Self {
        Self {
            prefix: format!("{parent_uid}/{scope}"),
            local_id: local_id.to_string(),
        }
    }

    /// The gateway-local identifier.
    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.prefix, self.local_id)
    }
}

/// A child as reported by its gateway on one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildReport {
    /// Gateway-local identifier.
    pub local_id: String,
    /// Name reported by the gateway; empty if it has none.
    pub name: String,
    /// Type path of the child.
    pub whatami: String,
    /// Observed status.
    pub status: Status,
    /// Observed properties.
    pub properties: Map<String, Value>,
}

impl ChildReport {
    /// Creates a report without properties.
    #[must_use]
    pub fn new(
        local_id: impl Into<String>,
        name: impl Into<String>,
        whatami: impl Into<String>,
        status: Status,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            name: name.into(),
            whatami: whatami.into(),
            status,
            properties: Map::new(),
        }
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    fn change(&self) -> StateChange {
        let mut changes = Vec::with_capacity(self.properties.len() + 2);
        if !self.name.is_empty() {
            changes.push(StateChange::name(self.name.clone()));
        }
        changes.push(StateChange::status(self.status));
        changes.extend(
            self.properties
                .iter()
                .map(|(key, value)| StateChange::property(key.clone(), value.clone())),
        );
        StateChange::Batch(changes)
    }
}

#[derive(Debug, Clone)]
enum Binding {
    /// No registry record yet; state is kept locally.
    Unbound(DeviceState),
    /// Bound to a record; state changes are published.
    Bound(Arc<DeviceStateStore>),
}

/// A child known to the gateway.
#[derive(Debug, Clone)]
pub struct ChildDevice {
    key: CompositeKey,
    binding: Binding,
}

impl ChildDevice {
    /// Gateway-local identifier.
    #[must_use]
    pub fn local_id(&self) -> &str {
        self.key.local_id()
    }

    /// Composite registry key.
    #[must_use]
    pub fn key(&self) -> &CompositeKey {
        &self.key
    }

    /// Registry identifier, once bound.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        match &self.binding {
            Binding::Unbound(_) => None,
            Binding::Bound(store) => Some(store.device_id()),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> DeviceState {
        match &self.binding {
            Binding::Unbound(state) => state.clone(),
            Binding::Bound(store) => store.snapshot(),
        }
    }

    fn apply(&mut self, change: &StateChange) -> bool {
        match &mut self.binding {
            Binding::Unbound(state) => state.apply(change),
            Binding::Bound(store) => store.apply(change),
        }
    }

    fn bind(&mut self, id: DeviceId, events: &EventBus) {
        if let Binding::Unbound(state) = &self.binding {
            let store = DeviceStateStore::new(id, state.clone(), events.clone());
            self.binding = Binding::Bound(Arc::new(store));
            events.publish(DeviceEvent::DeviceAdded { device_id: id });
        }
    }
}

/// Reconciles the children a gateway reports against the registry.
///
/// A child keeps its identifier for as long as its local identifier is
/// stable: known children skip the registry, unknown ones are looked up by
/// composite key and created when absent. Storage failures degrade instead
/// of failing the refresh: a failed lookup is treated as "not found", a
/// failed create leaves the child unbound until a later refresh binds it.
///
/// Children are never removed, even when a refresh stops reporting them.
pub struct CompositeDeviceRegistry<R> {
    store: Arc<R>,
    events: EventBus,
    parent: DeviceId,
    parent_uid: String,
    scope: String,
    children: Mutex<BTreeMap<String, ChildDevice>>,
    reconciling: tokio::sync::Mutex<()>,
}

impl<R: RegistryStore> CompositeDeviceRegistry<R> {
    /// Creates a registry for the children of `parent`, keyed
    /// `parent_uid/scope/local`.
    #[must_use]
    pub fn new(
        store: Arc<R>,
        events: EventBus,
        parent: DeviceId,
        parent_uid: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            store,
            events,
            parent,
            parent_uid: parent_uid.into(),
            scope: scope.into(),
            children: Mutex::new(BTreeMap::new()),
            reconciling: tokio::sync::Mutex::new(()),
        }
    }

    fn key_for(&self, local_id: &str) -> CompositeKey {
        CompositeKey::scoped(&self.parent_uid, &self.scope, local_id)
    }

    /// Brings the known children in line with `reports` and returns every
    /// known child by local identifier.
    ///
    /// Concurrent calls are serialized, so a child is never created twice.
    pub async fn reconcile(&self, reports: Vec<ChildReport>) -> BTreeMap<String, ChildDevice> {
        let _serial = self.reconciling.lock().await;

        for report in reports {
            let change = report.change();
            let bound = self
                .children
                .lock()
                .get(&report.local_id)
                .is_some_and(|child| child.device_id().is_some());
            if bound {
                if let Some(child) = self.children.lock().get_mut(&report.local_id) {
                    child.apply(&change);
                }
                continue;
            }

            let key = self.key_for(&report.local_id);
            let resolved = self.resolve(&key, &report).await;

            let mut children = self.children.lock();
            let child = children
                .entry(report.local_id.clone())
                .or_insert_with(|| {
                    let name = resolved
                        .as_ref()
                        .and_then(|(_, name)| name.clone())
                        .unwrap_or_else(|| report.name.clone());
                    ChildDevice {
                        key,
                        binding: Binding::Unbound(DeviceState::new(
                            name,
                            report.whatami.clone(),
                            report.status,
                        )),
                    }
                });
            if let Some((id, _)) = resolved {
                child.bind(id, &self.events);
            }
            child.apply(&change);
        }

        self.children()
    }

    /// Finds or creates the record for `key`.
    async fn resolve(
        &self,
        key: &CompositeKey,
        report: &ChildReport,
    ) -> Option<(DeviceId, Option<String>)> {
        let key_text = key.to_string();
        match self.store.lookup(&key_text).await {
            Ok(Some(record)) => {
                tracing::debug!(key = %key_text, id = %record.id, "Child bound to existing record");
                return Some((record.id, Some(record.name)));
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(key = %key_text, error = %err, "Registry lookup failed, creating");
            }
        }

        let record = NewRecord {
            name: report.name.clone(),
            whatami: report.whatami.clone(),
            parent: Some(self.parent),
        };
        match self.store.create(&key_text, record).await {
            Ok(id) => {
                tracing::info!(key = %key_text, id = %id, "Child registered");
                Some((id, None))
            }
            Err(err) => {
                tracing::error!(key = %key_text, error = %err, "Registry create failed");
                None
            }
        }
    }

    /// Every known child by local identifier.
    #[must_use]
    pub fn children(&self) -> BTreeMap<String, ChildDevice> {
        self.children.lock().clone()
    }

    /// The child bound to `id`.
    #[must_use]
    pub fn child_by_id(&self, id: DeviceId) -> Option<ChildDevice> {
        self.children
            .lock()
            .values()
            .find(|child| child.device_id() == Some(id))
            .cloned()
    }

    /// Applies a change to a known child.
    pub fn apply(&self, local_id: &str, change: &StateChange) -> bool {
        self.children
            .lock()
            .get_mut(local_id)
            .is_some_and(|child| child.apply(change))
    }
}

impl<R> fmt::Debug for CompositeDeviceRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeDeviceRegistry")
            .field("parent", &self.parent)
            .field("parent_uid", &self.parent_uid)
            .field("children", &self.children.lock().len())
            .finish_non_exhaustive()
    }
}
