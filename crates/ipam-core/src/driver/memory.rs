//! In-memory driver for tests

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{pool_tag, Driver, ExternalAddress, TAG_ALLOCATED, TAG_AUTOMATED};
use crate::address::{ExternalRef, IpAddress};
use crate::error::IpamError;

#[derive(Debug)]
struct Inventory {
    records: BTreeMap<u64, ExternalAddress>,
    next_id: u64,
    next_ip: IpAddress,
    mutations: usize,
    failing: bool,
}

/// Clones share one inventory, so a test can keep a handle after giving the
/// driver away.
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    pool_id: String,
    inventory: Arc<Mutex<Inventory>>,
}

impl MemoryDriver {
    /// Empty inventory. Created addresses count upward from `first_free`.
    pub fn new(pool_id: impl Into<String>, first_free: IpAddress) -> Self {
        Self {
            pool_id: pool_id.into(),
            inventory: Arc::new(Mutex::new(Inventory {
                records: BTreeMap::new(),
                next_id: 1,
                next_ip: first_free,
                mutations: 0,
                failing: false,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inventory>, IpamError> {
        self.inventory
            .lock()
            .map_err(|_| IpamError::Driver(format!("inventory of pool {} poisoned", self.pool_id)))
    }

    fn mutate(&self) -> Result<MutexGuard<'_, Inventory>, IpamError> {
        let mut inventory = self.lock()?;
        if inventory.failing {
            return Err(IpamError::Driver("injected failure".to_string()));
        }
        inventory.mutations += 1;
        Ok(inventory)
    }

    /// Seed an address of this pool. The pool tag is added automatically.
    pub fn insert(&self, ip: &str, tags: &[&str], annotation: &str) -> Result<ExternalAddress, IpamError> {
        let ip: IpAddress = ip.parse()?;
        let mut inventory = self.lock()?;
        let id = inventory.next_id;
        inventory.next_id += 1;

        let mut tag_set: BTreeSet<String> = tags.iter().map(ToString::to_string).collect();
        tag_set.insert(pool_tag(&self.pool_id));
        let address = ExternalAddress {
            external_ref: ExternalRef::new(id),
            ip,
            tags: tag_set,
            annotation: annotation.to_string(),
        };
        inventory.records.insert(id, address.clone());
        Ok(address)
    }

    /// Current inventory, ordered by address
    pub fn addresses(&self) -> Vec<ExternalAddress> {
        let mut all: Vec<ExternalAddress> = self
            .lock()
            .map(|inv| inv.records.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|a| a.ip);
        all
    }

    /// Number of create, retag and delete operations performed
    pub fn mutation_count(&self) -> usize {
        self.lock().map(|inv| inv.mutations).unwrap_or_default()
    }

    /// Make every mutating call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inventory) = self.lock() {
            inventory.failing = failing;
        }
    }

    fn update(
        &self,
        address: &ExternalAddress,
        edit: impl FnOnce(&mut ExternalAddress),
    ) -> Result<(), IpamError> {
        let mut inventory = self.mutate()?;
        let record = inventory
            .records
            .get_mut(&address.external_ref.get())
            .ok_or_else(|| IpamError::Driver(format!("address {} not found", address.ip)))?;
        edit(record);
        Ok(())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn pool_id(&self) -> &str {
        &self.pool_id
    }

    async fn list_addresses(&self) -> Result<Vec<ExternalAddress>, IpamError> {
        Ok(self.addresses())
    }

    async fn mark_allocated(&self, address: &ExternalAddress, consumer: &str) -> Result<(), IpamError> {
        self.update(address, |record| {
            record.tags.insert(TAG_ALLOCATED.to_string());
            record.annotation = consumer.to_string();
        })
    }

    async fn mark_released(&self, address: &ExternalAddress) -> Result<(), IpamError> {
        self.update(address, |record| {
            record.tags.remove(TAG_ALLOCATED);
            record.annotation.clear();
        })
    }

    async fn create_addresses(&self, count: usize) -> Result<Vec<ExternalAddress>, IpamError> {
        let mut inventory = self.mutate()?;
        let mut created = Vec::with_capacity(count);

        while created.len() < count {
            let ip = inventory.next_ip;
            inventory.next_ip = ip.increase_by(1);
            if inventory.records.values().any(|r| r.ip == ip) {
                continue;
            }

            let id = inventory.next_id;
            inventory.next_id += 1;
            let address = ExternalAddress {
                external_ref: ExternalRef::new(id),
                ip,
                tags: [pool_tag(&self.pool_id), TAG_AUTOMATED.to_string()].into_iter().collect(),
                annotation: String::new(),
            };
            inventory.records.insert(id, address.clone());
            created.push(address);
        }
        Ok(created)
    }

    async fn delete_address(&self, address: &ExternalAddress) -> Result<(), IpamError> {
        if !address.is_automated() {
            return Err(IpamError::Driver(format!(
                "refusing to delete {}: not created by this system",
                address.ip
            )));
        }
        let mut inventory = self.mutate()?;
        inventory.records.remove(&address.external_ref.get());
        Ok(())
    }
}
