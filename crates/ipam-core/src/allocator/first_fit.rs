use async_trait::async_trait;
use tracing::debug;

use super::Allocator;
use crate::address::IpAddress;
use crate::error::IpamError;
use crate::pool::Pool;

/// Takes the first unleased entry of the pool's address list, in list order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstFitAllocator;

#[async_trait]
impl Allocator for FirstFitAllocator {
    fn name(&self) -> &'static str {
        "first-fit"
    }

    async fn allocate(&self, pool: &mut Pool, consumer: &str) -> Result<IpAddress, IpamError> {
        if let Some(existing) = pool.lease_of(consumer) {
            debug!(pool = %pool.name(), consumer, address = %existing, "Consumer already holds a lease");
            return Ok(existing);
        }

        let candidate = pool
            .list_addresses()
            .into_iter()
            .find(|address| !address.allocated)
            .ok_or_else(|| IpamError::PoolExhausted(pool.name().to_string()))?;

        pool.mark_used_by(candidate.ip, consumer).await?;
        Ok(candidate.ip)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crds::{IPAllocation, IPPoolSpec};

    use super::*;
    use crate::store::MemoryPoolStore;

    fn list_pool(addresses: &[&str], allocations: Vec<IPAllocation>) -> Arc<MemoryPoolStore> {
        Arc::new(MemoryPoolStore::new(
            "default/list",
            IPPoolSpec {
                addresses: addresses.iter().map(ToString::to_string).collect(),
                allocations,
                ..Default::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_takes_first_free_in_list_order() {
        let store = list_pool(
            &["10.1.1.7", "10.1.1.2", "10.1.1.3"],
            vec![IPAllocation { address: "10.1.1.7".to_string(), consumer_id: "c0".to_string() }],
        );
        let mut pool = Pool::open(store.clone()).await.unwrap();

        let ip = FirstFitAllocator.allocate(&mut pool, "c1").await.unwrap();
        assert_eq!(ip.to_string(), "10.1.1.2");
        assert_eq!(store.spec().allocations.len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_and_empty() {
        let store = list_pool(
            &["10.1.1.2"],
            vec![IPAllocation { address: "10.1.1.2".to_string(), consumer_id: "c0".to_string() }],
        );
        let mut pool = Pool::open(store).await.unwrap();
        let err = FirstFitAllocator.allocate(&mut pool, "c1").await.unwrap_err();
        assert!(matches!(err, IpamError::PoolExhausted(_)));

        let mut empty = Pool::open(list_pool(&[], Vec::new())).await.unwrap();
        let err = FirstFitAllocator.allocate(&mut empty, "c1").await.unwrap_err();
        assert!(matches!(err, IpamError::PoolExhausted(_)));
    }

    #[tokio::test]
    async fn test_existing_lease_is_returned() {
        let store = list_pool(&["10.1.1.2", "10.1.1.3"], Vec::new());
        let mut pool = Pool::open(store.clone()).await.unwrap();

        let first = FirstFitAllocator.allocate(&mut pool, "c1").await.unwrap();
        let again = FirstFitAllocator.allocate(&mut pool, "c1").await.unwrap();
        assert_eq!(first, again);
        assert_eq!(store.spec().allocations.len(), 1);
        assert_eq!(store.persist_count(), 1);
    }
}
