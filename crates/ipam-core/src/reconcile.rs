//! One reconcile cycle for a driver-backed pool

use std::time::Duration;

use tracing::debug;

use crate::driver::{Driver, DriverFactory};
use crate::error::IpamError;
use crate::store::PoolStore;
use crate::sync::{sync, SyncReport};

/// Base delay before retrying a failed cycle.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Delay between successful cycles.
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Builds a driver from a pool's `type` and `rawConfig`.
pub type DriverResolver = dyn Fn(&str, &str) -> Result<Box<dyn Driver>, IpamError> + Send + Sync;

/// Resolver backed by [`DriverFactory`].
pub fn default_resolver() -> Box<DriverResolver> {
    Box::new(DriverFactory::create)
}

/// Fetch the pool, sync it against its driver and persist the result.
///
/// The record is written only when sync changed it, and never when sync
/// failed. A pool without a driver type is left alone.
pub async fn run_cycle(store: &dyn PoolStore, resolve: &DriverResolver) -> Result<Option<SyncReport>, IpamError> {
    let snapshot = store.fetch().await?;
    if !snapshot.spec.is_driver_backed() {
        debug!(pool = %store.pool_name(), "Pool has no driver, nothing to sync");
        return Ok(None);
    }

    let driver = resolve(&snapshot.spec.driver_type, &snapshot.spec.raw_config)?;
    let mut spec = snapshot.spec.clone();
    let report = sync(driver.as_ref(), &mut spec).await?;

    if spec == snapshot.spec {
        debug!(pool = %store.pool_name(), "Pool record unchanged");
    } else {
        store.persist(&spec, &snapshot.version).await?;
    }
    Ok(Some(report))
}
