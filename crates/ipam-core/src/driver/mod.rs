//! External IPAM drivers
//!
//! A driver is bound to one pool at construction and exposes that pool's slice
//! of the external inventory. Ownership and lease state live in tags:
//!
//! - `pool-<id>` marks an address as belonging to the pool
//! - `automated` marks an address this system created (and may delete)
//! - `allocated` marks an address as leased; the consumer is kept as annotation

mod factory;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod netbox;

pub use factory::{DriverFactory, NETBOX_DRIVER};
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryDriver;
pub use netbox::{NetBoxDriver, NetBoxDriverConfig};

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::address::{Address, ExternalRef, IpAddress};
use crate::error::IpamError;

pub const TAG_AUTOMATED: &str = "automated";
pub const TAG_ALLOCATED: &str = "allocated";

/// Tag marking membership in pool `pool_id`
pub fn pool_tag(pool_id: &str) -> String {
    format!("pool-{pool_id}")
}

/// One address record of the external inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalAddress {
    pub external_ref: ExternalRef,
    pub ip: IpAddress,
    pub tags: BTreeSet<String>,
    /// Free-form annotation; holds the consumer id while allocated
    pub annotation: String,
}

impl ExternalAddress {
    pub fn is_automated(&self) -> bool {
        self.tags.contains(TAG_AUTOMATED)
    }

    pub fn is_allocated(&self) -> bool {
        self.tags.contains(TAG_ALLOCATED)
    }

    /// Whether the record already says "leased to `consumer`".
    pub fn is_leased_to(&self, consumer: &str) -> bool {
        self.is_allocated() && self.annotation == consumer
    }
}

impl From<&ExternalAddress> for Address {
    fn from(external: &ExternalAddress) -> Self {
        Address {
            ip: external.ip,
            allocated: external.is_allocated(),
            external_ref: Some(external.external_ref),
        }
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Pool identifier this driver is bound to
    fn pool_id(&self) -> &str;

    /// Every address tagged as belonging to the pool.
    async fn list_addresses(&self) -> Result<Vec<ExternalAddress>, IpamError>;

    /// Tag `address` allocated and annotate it with `consumer`.
    async fn mark_allocated(&self, address: &ExternalAddress, consumer: &str) -> Result<(), IpamError>;

    /// Remove the allocated tag and the consumer annotation.
    async fn mark_released(&self, address: &ExternalAddress) -> Result<(), IpamError>;

    /// Create `count` fresh addresses tagged for the pool and `automated`.
    async fn create_addresses(&self, count: usize) -> Result<Vec<ExternalAddress>, IpamError>;

    /// Delete an address. Refuses records without the `automated` tag.
    async fn delete_address(&self, address: &ExternalAddress) -> Result<(), IpamError>;
}
