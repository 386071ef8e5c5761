//! Allocate and release against a pool store, retrying lost races
//!
//! Each attempt reopens the pool so it works from the latest record. Only
//! [`IpamError::Conflict`] and, for allocation, [`IpamError::AddressUnavailable`]
//! are retried; both mean another writer changed the pool underneath us.

use std::sync::Arc;

use tracing::{info, warn};

use crate::address::IpAddress;
use crate::allocator;
use crate::error::IpamError;
use crate::pool::Pool;
use crate::store::PoolStore;

/// Attempts per operation before a conflict is surfaced to the caller.
pub const MAX_ATTEMPTS: usize = 5;

/// Lease an address from the pool to `consumer`, using the pool's strategy.
///
/// Idempotent per consumer: a consumer that already holds a lease gets it back.
pub async fn allocate(store: Arc<dyn PoolStore>, consumer: &str) -> Result<IpAddress, IpamError> {
    let mut attempt = 1;
    loop {
        let mut pool = Pool::open(Arc::clone(&store)).await?;
        let allocator = allocator::for_strategy(&pool.spec().effective_strategy());

        match allocator.allocate(&mut pool, consumer).await {
            Ok(ip) => {
                info!(pool = %pool.name(), consumer, address = %ip, allocator = allocator.name(), "Address allocated");
                return Ok(ip);
            }
            Err(e @ (IpamError::Conflict { .. } | IpamError::AddressUnavailable { .. }))
                if attempt < MAX_ATTEMPTS =>
            {
                warn!(pool = %pool.name(), consumer, attempt, "Allocation lost a race, retrying: {}", e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Release every lease held by `consumer`. Returns whether one existed.
pub async fn release(store: Arc<dyn PoolStore>, consumer: &str) -> Result<bool, IpamError> {
    let mut attempt = 1;
    loop {
        let mut pool = Pool::open(Arc::clone(&store)).await?;
        let allocator = allocator::for_strategy(&pool.spec().effective_strategy());

        match allocator.release_by(&mut pool, consumer).await {
            Ok(released) => {
                info!(pool = %pool.name(), consumer, released, "Lease released");
                return Ok(released);
            }
            Err(e @ IpamError::Conflict { .. }) if attempt < MAX_ATTEMPTS => {
                warn!(pool = %pool.name(), consumer, attempt, "Release lost a race, retrying: {}", e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use crds::{IPAllocation, IPPoolSpec};

    use super::*;
    use crate::store::MemoryPoolStore;

    fn range_store() -> MemoryPoolStore {
        MemoryPoolStore::new(
            "default/range",
            IPPoolSpec {
                range: Some("10.1.1.0/29".to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_allocate_retries_after_conflict() {
        let store = range_store();
        store.inject_conflicts(2);

        let ip = allocate(Arc::new(store.clone()), "c1").await.unwrap();
        assert_eq!(ip.to_string(), "10.1.1.1");
        assert_eq!(store.persist_count(), 1);
    }

    #[tokio::test]
    async fn test_allocate_gives_up_after_max_attempts() {
        let store = range_store();
        store.inject_conflicts(MAX_ATTEMPTS);

        let err = allocate(Arc::new(store.clone()), "c1").await.unwrap_err();
        assert!(matches!(err, IpamError::Conflict { .. }));
        assert!(store.spec().allocations.is_empty());
    }

    #[tokio::test]
    async fn test_allocate_is_idempotent_per_consumer() {
        let store: Arc<dyn PoolStore> = Arc::new(range_store());
        let a = allocate(Arc::clone(&store), "c1").await.unwrap();
        let b = allocate(Arc::clone(&store), "c2").await.unwrap();
        let again = allocate(Arc::clone(&store), "c1").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a, again);
    }

    #[tokio::test]
    async fn test_range_pool_exhausts_before_last_usable() {
        let store: Arc<dyn PoolStore> = Arc::new(range_store());
        for i in 1..=5 {
            let ip = allocate(Arc::clone(&store), &format!("c{i}")).await.unwrap();
            assert_eq!(ip.to_string(), format!("10.1.1.{i}"));
        }
        let err = allocate(store, "c6").await.unwrap_err();
        assert!(matches!(err, IpamError::PoolExhausted(_)));
    }

    #[tokio::test]
    async fn test_concurrent_allocations_never_share_an_address() {
        let store: Arc<dyn PoolStore> = Arc::new(range_store());
        let mut handles = Vec::new();
        for i in 0..4 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move { allocate(store, &format!("c{i}")).await }));
        }

        let mut leased = Vec::new();
        for handle in handles {
            leased.push(handle.await.unwrap().unwrap());
        }
        leased.sort();
        leased.dedup();
        assert_eq!(leased.len(), 4);
    }

    #[tokio::test]
    async fn test_release_by_consumer() {
        let store = MemoryPoolStore::new(
            "default/list",
            IPPoolSpec {
                addresses: vec!["10.1.1.2".to_string()],
                allocations: vec![IPAllocation {
                    address: "10.1.1.2".to_string(),
                    consumer_id: "c1".to_string(),
                }],
                ..Default::default()
            },
        );
        store.inject_conflicts(1);

        assert!(release(Arc::new(store.clone()), "c1").await.unwrap());
        assert!(store.spec().allocations.is_empty());
        assert!(!release(Arc::new(store), "c1").await.unwrap());
    }
}
