// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process registry store.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::StorageError;
use crate::event::DeviceId;

use super::{NewRecord, RegistryRecord, RegistryStore};

#[derive(Debug)]
struct Records {
    next_id: u64,
    by_key: HashMap<String, RegistryRecord>,
}

/// Registry kept in memory; identifiers are assigned sequentially from 1.
///
/// # Examples
///
/// ```
/// use homehub_lib::registry::{MemoryRegistry, NewRecord, RegistryStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry = MemoryRegistry::new();
/// let record = NewRecord {
///     name: "Bulb".into(),
///     whatami: "/device/lighting/tcpi/led".into(),
///     parent: None,
/// };
/// let id = registry.create("gw-1/bulbs/1", record).await.unwrap();
/// assert_eq!(id.value(), 1);
/// assert!(registry.lookup("gw-1/bulbs/1").await.unwrap().is_some());
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryRegistry {
    records: Mutex<Records>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Records {
                next_id: 1,
                by_key: HashMap::new(),
            }),
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().by_key.len()
    }

    /// Returns `true` if no record exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns every record, ordered by identifier.
    #[must_use]
    pub fn records(&self) -> Vec<RegistryRecord> {
        let mut records: Vec<_> = self.records.lock().by_key.values().cloned().collect();
        records.sort_by_key(|record| record.id);
        records
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryStore for MemoryRegistry {
    async fn lookup(&self, key: &str) -> Result<Option<RegistryRecord>, StorageError> {
        Ok(self.records.lock().by_key.get(key).cloned())
    }

    async fn create(&self, key: &str, record: NewRecord) -> Result<DeviceId, StorageError> {
        let mut records = self.records.lock();
        if records.by_key.contains_key(key) {
            return Err(StorageError::Create {
                key: key.to_string(),
                message: "key already bound".to_string(),
            });
        }

        let id = DeviceId::new(records.next_id);
        records.next_id += 1;
        records.by_key.insert(
            key.to_string(),
            RegistryRecord {
                id,
                key: key.to_string(),
                name: record.name,
                whatami: record.whatami,
                parent: record.parent,
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> NewRecord {
        NewRecord {
            name: name.to_string(),
            whatami: "/device/switch/wemo/onoff".to_string(),
            parent: None,
        }
    }

    #[tokio::test]
    async fn ids_are_sequential() {
        let registry = MemoryRegistry::new();
        let a = registry.create("a", record("A")).await.unwrap();
        let b = registry.create("b", record("B")).await.unwrap();
        assert_eq!((a.value(), b.value()), (1, 2));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_key_is_rejected() {
        let registry = MemoryRegistry::new();
        registry.create("a", record("A")).await.unwrap();
        let err = registry.create("a", record("A")).await.unwrap_err();
        assert!(matches!(err, StorageError::Create { .. }));
    }

    #[tokio::test]
    async fn lookup_unknown_key() {
        let registry = MemoryRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.lookup("missing").await.unwrap(), None);
    }
}
