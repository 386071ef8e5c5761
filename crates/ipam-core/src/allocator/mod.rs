//! Address selection policies
//!
//! An [`Allocator`] picks a free address in an opened [`Pool`] and records the
//! lease. A consumer that already holds a lease gets the same address back.

mod first_fit;
mod linear_scan;

pub use first_fit::FirstFitAllocator;
pub use linear_scan::LinearScanAllocator;

use async_trait::async_trait;
use crds::AllocationStrategy;

use crate::address::IpAddress;
use crate::error::IpamError;
use crate::pool::Pool;

#[async_trait]
pub trait Allocator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lease a free address to `consumer`.
    async fn allocate(&self, pool: &mut Pool, consumer: &str) -> Result<IpAddress, IpamError>;

    /// Release `ip`. Releasing a free address succeeds and returns false.
    async fn release(&self, pool: &mut Pool, ip: IpAddress) -> Result<bool, IpamError> {
        pool.mark_released(Some(ip), "").await
    }

    /// Release whatever `consumer` holds.
    async fn release_by(&self, pool: &mut Pool, consumer: &str) -> Result<bool, IpamError> {
        pool.mark_released(None, consumer).await
    }
}

/// Allocator implementing `strategy`.
pub fn for_strategy(strategy: &AllocationStrategy) -> Box<dyn Allocator> {
    match strategy {
        AllocationStrategy::FirstFit => Box::new(FirstFitAllocator),
        AllocationStrategy::LinearScan => Box::new(LinearScanAllocator),
    }
}
