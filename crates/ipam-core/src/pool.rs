//! A pool opened for allocation or release
//!
//! [`Pool`] is a snapshot of one pool record plus a handle to the store it came
//! from. Reads are answered from the snapshot; every mutation is written back
//! immediately with compare-and-swap on the snapshot version.

use std::collections::HashSet;
use std::sync::Arc;

use crds::{IPAllocation, IPPoolSpec};
use tracing::{debug, warn};

use crate::address::{Address, IpAddress};
use crate::error::IpamError;
use crate::range::AddressRange;
use crate::store::{PoolSnapshot, PoolStore};

pub struct Pool {
    store: Arc<dyn PoolStore>,
    snapshot: PoolSnapshot,
    // set once a write fails; the snapshot no longer matches the store
    stale: bool,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name())
            .field("version", &self.snapshot.version)
            .field("stale", &self.stale)
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Read the pool record from `store`.
    pub async fn open(store: Arc<dyn PoolStore>) -> Result<Self, IpamError> {
        let snapshot = store.fetch().await?;
        Ok(Self {
            store,
            snapshot,
            stale: false,
        })
    }

    pub fn name(&self) -> &str {
        self.store.pool_name()
    }

    pub fn spec(&self) -> &IPPoolSpec {
        &self.snapshot.spec
    }

    pub fn version(&self) -> &str {
        &self.snapshot.version
    }

    fn range(&self) -> Result<Option<AddressRange>, IpamError> {
        self.snapshot
            .spec
            .range
            .as_deref()
            .map(str::parse)
            .transpose()
    }

    /// Candidate addresses in list order, with their lease state.
    ///
    /// Entries that do not parse are skipped.
    pub fn list_addresses(&self) -> Vec<Address> {
        let leased: HashSet<IpAddress> = self
            .snapshot
            .spec
            .allocations
            .iter()
            .filter_map(|a| a.address.parse().ok())
            .collect();

        self.snapshot
            .spec
            .addresses
            .iter()
            .filter_map(|raw| match raw.parse::<IpAddress>() {
                Ok(ip) => Some(Address {
                    ip,
                    allocated: leased.contains(&ip),
                    external_ref: None,
                }),
                Err(e) => {
                    warn!(pool = %self.name(), "Skipping unparsable pool address: {}", e);
                    None
                }
            })
            .collect()
    }

    /// First and last usable address of the pool range (network + 1 and
    /// broadcast - 1).
    pub fn first_and_last_address(&self) -> Result<(IpAddress, IpAddress), IpamError> {
        let range = self
            .range()?
            .ok_or_else(|| IpamError::Config(format!("pool {} has no range", self.name())))?;
        Ok((range.first(), range.last()))
    }

    /// Whether `ip` belongs to the pool and carries no lease.
    ///
    /// A lease record whose address cannot be parsed makes every address
    /// unavailable until it is cleaned up.
    pub fn is_available(&self, ip: IpAddress) -> Result<bool, IpamError> {
        let range = self.range()?;
        let spec = &self.snapshot.spec;

        let in_range = range.is_none_or(|r| r.is_usable(ip));
        let in_list = if spec.addresses.is_empty() {
            range.is_some()
        } else {
            spec.addresses
                .iter()
                .any(|raw| raw.parse::<IpAddress>().is_ok_and(|candidate| candidate == ip))
        };
        if !(in_range && in_list) {
            return Ok(false);
        }

        for allocation in &spec.allocations {
            match allocation.address.parse::<IpAddress>() {
                Ok(leased) if leased == ip => return Ok(false),
                Ok(_) => {}
                Err(e) => {
                    warn!(pool = %self.name(), consumer = %allocation.consumer_id, "Unparsable lease blocks allocation: {}", e);
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Address currently leased to `consumer`, if any.
    pub fn lease_of(&self, consumer: &str) -> Option<IpAddress> {
        if consumer.is_empty() {
            return None;
        }
        self.snapshot
            .spec
            .allocations
            .iter()
            .filter(|a| a.consumer_id == consumer)
            .find_map(|a| a.address.parse().ok())
    }

    /// Record a lease of `ip` to `consumer` and write it back.
    pub async fn mark_used_by(&mut self, ip: IpAddress, consumer: &str) -> Result<(), IpamError> {
        self.ensure_fresh()?;
        if !self.is_available(ip)? {
            return Err(IpamError::AddressUnavailable {
                pool: self.name().to_string(),
                address: ip,
            });
        }

        self.snapshot.spec.allocations.push(IPAllocation {
            address: ip.to_string(),
            consumer_id: consumer.to_string(),
        });
        self.commit().await?;
        debug!(pool = %self.name(), address = %ip, consumer, "Lease recorded");
        Ok(())
    }

    /// Drop the first lease matching `ip` or held by `consumer` (when
    /// non-empty).
    ///
    /// Returns whether a lease was removed. Releasing an address that is not
    /// leased is not an error and does not write.
    pub async fn mark_released(&mut self, ip: Option<IpAddress>, consumer: &str) -> Result<bool, IpamError> {
        self.ensure_fresh()?;

        let position = self.snapshot.spec.allocations.iter().position(|a| {
            let by_address = ip.is_some_and(|ip| a.address.parse::<IpAddress>().is_ok_and(|leased| leased == ip));
            let by_consumer = !consumer.is_empty() && a.consumer_id == consumer;
            by_address || by_consumer
        });
        let Some(index) = position else {
            return Ok(false);
        };
        let released = self.snapshot.spec.allocations.remove(index);

        self.commit().await?;
        debug!(pool = %self.name(), address = %released.address, consumer = %released.consumer_id, "Lease released");
        Ok(true)
    }

    fn ensure_fresh(&self) -> Result<(), IpamError> {
        if self.stale {
            return Err(IpamError::BackingStore(format!(
                "pool {} snapshot is stale after a failed write, reopen it",
                self.name()
            )));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), IpamError> {
        match self.store.persist(&self.snapshot.spec, &self.snapshot.version).await {
            Ok(version) => {
                self.snapshot.version = version;
                Ok(())
            }
            Err(e) => {
                self.stale = true;
                Err(e)
            }
        }
    }
}
