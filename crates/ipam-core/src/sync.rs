//! Pool / external IPAM reconciliation
//!
//! The pool's allocations are authoritative for who holds what; the external
//! inventory is authoritative for which addresses exist. [`sync`] makes the
//! inventory carry exactly [`RESERVE_COUNT`] free addresses beyond the leased
//! ones, copies the inventory into the pool's address list and pushes lease
//! state out as tags. It is idempotent: a second run with nothing changed
//! issues no driver mutations.

use std::collections::HashMap;

use crds::{IPAllocation, IPPoolSpec};
use tracing::{debug, info, warn};

use crate::address::IpAddress;
use crate::driver::Driver;
use crate::error::IpamError;

/// Free addresses kept ready beyond the leased ones.
pub const RESERVE_COUNT: usize = 1;

/// What one sync run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub deleted: usize,
    pub marked_allocated: usize,
    pub marked_released: usize,
    /// Leases whose address is missing from the external inventory
    pub orphaned_allocations: Vec<IPAllocation>,
    pub total_addresses: usize,
    pub allocated_addresses: usize,
}

impl SyncReport {
    /// Driver mutations issued
    pub fn mutations(&self) -> usize {
        self.created + self.deleted + self.marked_allocated + self.marked_released
    }
}

fn desired_leases(allocations: &[IPAllocation]) -> Result<HashMap<IpAddress, &str>, IpamError> {
    allocations
        .iter()
        .map(|a| {
            a.address
                .parse::<IpAddress>()
                .map(|ip| (ip, a.consumer_id.as_str()))
                .map_err(|e| {
                    IpamError::Sync(format!(
                        "lease {:?} held by {:?} is unparsable: {e}",
                        a.address, a.consumer_id
                    ))
                })
        })
        .collect()
}

/// Reconcile `spec` with the inventory behind `driver`.
///
/// On success `spec.addresses` mirrors the inventory (sorted). On error the
/// driver may have been partly updated but `spec` must not be persisted; the
/// next run converges.
pub async fn sync(driver: &dyn Driver, spec: &mut IPPoolSpec) -> Result<SyncReport, IpamError> {
    // Parse everything before the first driver call.
    let desired = desired_leases(&spec.allocations)?;
    let pool = driver.pool_id().to_string();
    let mut report = SyncReport::default();

    let wanted = spec.allocations.len() + RESERVE_COUNT;
    let known = spec.addresses.len();

    if known < wanted {
        let missing = wanted - known;
        info!(pool = %pool, missing, "Creating addresses in external IPAM");
        report.created = driver.create_addresses(missing).await?.len();
    }

    let mut inventory = driver.list_addresses().await?;

    if known > wanted {
        let mut surplus = known - wanted;
        let mut kept = Vec::with_capacity(inventory.len());
        for address in inventory {
            let deletable = address.is_automated()
                && !address.is_allocated()
                && !desired.contains_key(&address.ip);
            if surplus > 0 && deletable {
                info!(pool = %pool, address = %address.ip, "Deleting surplus address");
                driver.delete_address(&address).await?;
                report.deleted += 1;
                surplus -= 1;
            } else {
                kept.push(address);
            }
        }
        inventory = kept;
    }

    inventory.sort_by_key(|a| a.ip);
    spec.addresses = inventory.iter().map(|a| a.ip.to_string()).collect();

    for address in &inventory {
        match desired.get(&address.ip) {
            Some(consumer) if !address.is_leased_to(consumer) => {
                debug!(pool = %pool, address = %address.ip, consumer, "Marking allocated");
                driver.mark_allocated(address, consumer).await?;
                report.marked_allocated += 1;
            }
            None if address.is_allocated() => {
                debug!(pool = %pool, address = %address.ip, "Marking released");
                driver.mark_released(address).await?;
                report.marked_released += 1;
            }
            _ => {}
        }
    }

    for allocation in &spec.allocations {
        let present = allocation
            .address
            .parse::<IpAddress>()
            .is_ok_and(|ip| inventory.iter().any(|a| a.ip == ip));
        if !present {
            warn!(
                pool = %pool,
                address = %allocation.address,
                consumer = %allocation.consumer_id,
                "Lease has no backing address in external IPAM"
            );
            report.orphaned_allocations.push(allocation.clone());
        }
    }

    report.total_addresses = spec.addresses.len();
    report.allocated_addresses = spec.allocations.len();
    info!(
        pool = %pool,
        created = report.created,
        deleted = report.deleted,
        marked_allocated = report.marked_allocated,
        marked_released = report.marked_released,
        orphaned = report.orphaned_allocations.len(),
        "Sync finished"
    );
    Ok(report)
}
