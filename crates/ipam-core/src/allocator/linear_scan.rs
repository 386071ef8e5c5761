use async_trait::async_trait;
use tracing::debug;

use super::Allocator;
use crate::address::IpAddress;
use crate::error::IpamError;
use crate::pool::Pool;

/// Walks the pool range upward from its first usable address and takes the
/// first one that is available. The last usable address (broadcast - 1) is
/// kept in reserve and the broadcast address is never handed out.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanAllocator;

#[async_trait]
impl Allocator for LinearScanAllocator {
    fn name(&self) -> &'static str {
        "linear-scan"
    }

    async fn allocate(&self, pool: &mut Pool, consumer: &str) -> Result<IpAddress, IpamError> {
        if let Some(existing) = pool.lease_of(consumer) {
            debug!(pool = %pool.name(), consumer, address = %existing, "Consumer already holds a lease");
            return Ok(existing);
        }

        let (first, last) = pool.first_and_last_address()?;
        let mut current = first;
        while current.less_than(&last) {
            if pool.is_available(current)? {
                pool.mark_used_by(current, consumer).await?;
                return Ok(current);
            }
            current = current.increase_by(1);
        }

        Err(IpamError::PoolExhausted(pool.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crds::{IPAllocation, IPPoolSpec};

    use super::*;
    use crate::store::MemoryPoolStore;

    fn leases(addresses: &[&str]) -> Vec<IPAllocation> {
        addresses
            .iter()
            .enumerate()
            .map(|(i, address)| IPAllocation {
                address: address.to_string(),
                consumer_id: format!("c{i}"),
            })
            .collect()
    }

    fn range_pool(range: &str, allocations: Vec<IPAllocation>) -> Arc<MemoryPoolStore> {
        Arc::new(MemoryPoolStore::new(
            "default/range",
            IPPoolSpec {
                range: Some(range.to_string()),
                allocations,
                ..Default::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_skips_leased_addresses() {
        let store = range_pool(
            "10.1.1.0/24",
            leases(&["10.1.1.1", "10.1.1.2", "10.1.1.3", "10.1.1.4", "10.1.1.5"]),
        );
        let mut pool = Pool::open(store.clone()).await.unwrap();

        let ip = LinearScanAllocator.allocate(&mut pool, "new").await.unwrap();
        assert_eq!(ip.to_string(), "10.1.1.6");
        assert_eq!(store.spec().allocations.len(), 6);
    }

    #[tokio::test]
    async fn test_small_range_keeps_last_address_in_reserve() {
        let store = range_pool("10.1.1.0/30", Vec::new());
        let mut pool = Pool::open(store).await.unwrap();

        assert_eq!(LinearScanAllocator.allocate(&mut pool, "a").await.unwrap().to_string(), "10.1.1.1");
        let err = LinearScanAllocator.allocate(&mut pool, "b").await.unwrap_err();
        assert!(matches!(err, IpamError::PoolExhausted(_)));
    }

    #[tokio::test]
    async fn test_full_range_never_hands_out_last_usable() {
        let taken: Vec<String> = (1..=253).map(|host| format!("10.1.1.{host}")).collect();
        let taken: Vec<&str> = taken.iter().map(String::as_str).collect();
        let store = range_pool("10.1.1.0/24", leases(&taken));
        let mut pool = Pool::open(store).await.unwrap();

        let err = LinearScanAllocator.allocate(&mut pool, "late").await.unwrap_err();
        assert!(matches!(err, IpamError::PoolExhausted(_)));
    }

    #[tokio::test]
    async fn test_release_then_reuse() {
        let store = range_pool("10.1.1.0/30", leases(&["10.1.1.1"]));
        let mut pool = Pool::open(store).await.unwrap();

        assert!(LinearScanAllocator.release(&mut pool, "10.1.1.1".parse().unwrap()).await.unwrap());
        assert!(!LinearScanAllocator.release(&mut pool, "10.1.1.1".parse().unwrap()).await.unwrap());
        let ip = LinearScanAllocator.allocate(&mut pool, "c9").await.unwrap();
        assert_eq!(ip.to_string(), "10.1.1.1");
    }

    #[tokio::test]
    async fn test_requires_range() {
        let store = Arc::new(MemoryPoolStore::new("default/list", IPPoolSpec::default()));
        let mut pool = Pool::open(store).await.unwrap();
        let err = LinearScanAllocator.allocate(&mut pool, "c1").await.unwrap_err();
        assert!(matches!(err, IpamError::Config(_)));
    }
}
