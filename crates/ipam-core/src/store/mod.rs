//! Durable pool records
//!
//! A [`PoolStore`] owns exactly one pool record. Writes are compare-and-swap on
//! an opaque version string so concurrent allocators cannot both win.

mod custom_resource;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use custom_resource::KubePoolStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryPoolStore;

use async_trait::async_trait;
use crds::IPPoolSpec;

use crate::error::IpamError;

/// A pool record as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSnapshot {
    pub spec: IPPoolSpec,
    /// Opaque token identifying this revision of the record
    pub version: String,
}

#[async_trait]
pub trait PoolStore: Send + Sync {
    /// Human-readable pool identity used in logs and errors
    fn pool_name(&self) -> &str;

    /// Read the current record.
    async fn fetch(&self) -> Result<PoolSnapshot, IpamError>;

    /// Replace the record if it is still at `expected_version`.
    ///
    /// Returns the new version, or [`IpamError::Conflict`] when another writer
    /// got there first.
    async fn persist(&self, spec: &IPPoolSpec, expected_version: &str) -> Result<String, IpamError>;
}
