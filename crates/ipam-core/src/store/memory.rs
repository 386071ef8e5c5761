//! In-memory pool store for tests

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use crds::IPPoolSpec;

use super::{PoolSnapshot, PoolStore};
use crate::error::IpamError;

#[derive(Debug)]
struct Record {
    spec: IPPoolSpec,
    version: u64,
    persists: usize,
    conflicts_pending: usize,
}

/// Clones share the same record, standing in for several processes talking
/// to one API server.
#[derive(Debug, Clone)]
pub struct MemoryPoolStore {
    name: String,
    record: Arc<Mutex<Record>>,
}

impl MemoryPoolStore {
    pub fn new(name: impl Into<String>, spec: IPPoolSpec) -> Self {
        Self {
            name: name.into(),
            record: Arc::new(Mutex::new(Record {
                spec,
                version: 1,
                persists: 0,
                conflicts_pending: 0,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Record>, IpamError> {
        self.record
            .lock()
            .map_err(|_| IpamError::BackingStore(format!("pool {} lock poisoned", self.name)))
    }

    /// Current record contents
    pub fn spec(&self) -> IPPoolSpec {
        self.lock().map(|r| r.spec.clone()).unwrap_or_default()
    }

    /// Successful writes so far
    pub fn persist_count(&self) -> usize {
        self.lock().map(|r| r.persists).unwrap_or_default()
    }

    /// Make the next `n` writes lose a race with an invisible writer.
    pub fn inject_conflicts(&self, n: usize) {
        if let Ok(mut record) = self.lock() {
            record.conflicts_pending = n;
        }
    }

    /// Overwrite the record as another writer would, bumping the version.
    pub fn overwrite(&self, spec: IPPoolSpec) {
        if let Ok(mut record) = self.lock() {
            record.spec = spec;
            record.version += 1;
        }
    }
}

#[async_trait]
impl PoolStore for MemoryPoolStore {
    fn pool_name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<PoolSnapshot, IpamError> {
        let record = self.lock()?;
        Ok(PoolSnapshot {
            spec: record.spec.clone(),
            version: record.version.to_string(),
        })
    }

    async fn persist(&self, spec: &IPPoolSpec, expected_version: &str) -> Result<String, IpamError> {
        let mut record = self.lock()?;
        let conflict = IpamError::Conflict {
            pool: self.name.clone(),
            version: expected_version.to_string(),
        };

        if record.conflicts_pending > 0 {
            record.conflicts_pending -= 1;
            record.version += 1;
            return Err(conflict);
        }
        if record.version.to_string() != expected_version {
            return Err(conflict);
        }

        record.spec = spec.clone();
        record.version += 1;
        record.persists += 1;
        Ok(record.version.to_string())
    }
}
