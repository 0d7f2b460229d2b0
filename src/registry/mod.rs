// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistent device identities.
//!
//! The hub does not own the device database. It reaches it through a
//! [`RegistryStore`], which maps a stable key (a device UID, or a composite
//! key for gateway children) to a registry-assigned [`DeviceId`].
//! [`MemoryRegistry`] is an in-process store for embedders without a
//! database and for tests.
//!
//! [`CompositeDeviceRegistry`] reconciles a gateway's reported children
//! against the store.

mod composite;
mod memory;

pub use composite::{ChildDevice, ChildReport, CompositeDeviceRegistry, CompositeKey};
pub use memory::MemoryRegistry;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::event::DeviceId;

/// A record held by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    /// Assigned identifier.
    pub id: DeviceId,
    /// Key the record is bound to.
    pub key: String,
    /// Display name at creation or last update.
    pub name: String,
    /// Type path of the device family.
    pub whatami: String,
    /// Owning gateway, for child devices.
    pub parent: Option<DeviceId>,
}

/// Fields of a record to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Display name.
    pub name: String,
    /// Type path of the device family.
    pub whatami: String,
    /// Owning gateway, for child devices.
    pub parent: Option<DeviceId>,
}

/// The persistent registry collaborator.
///
/// Both operations may be slow and fallible. Implementations apply their
/// own retry policy before returning a [`StorageError`].
pub trait RegistryStore: Send + Sync + 'static {
    /// Looks up the record bound to `key`.
    fn lookup(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<RegistryRecord>, StorageError>> + Send;

    /// Creates a record bound to `key` and returns its identifier.
    fn create(
        &self,
        key: &str,
        record: NewRecord,
    ) -> impl Future<Output = Result<DeviceId, StorageError>> + Send;
}
