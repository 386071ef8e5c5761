//! Pod IPAM core
//!
//! IPv4 address pools for container networking: address arithmetic, pool
//! records with optimistic concurrency, allocation policies, and the sync loop
//! that keeps a pool aligned with an external IPAM such as NetBox.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ipam_core::{lease, KubePoolStore};
//! use kube::{Api, Client};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::try_default().await?;
//! let store = Arc::new(KubePoolStore::new(Api::namespaced(client, "kube-system"), "kube-system", "pods"));
//! let ip = lease::allocate(store.clone(), "4f1c0ad3e2b7").await?;
//! lease::release(store, "4f1c0ad3e2b7").await?;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod allocator;
pub mod driver;
pub mod error;
pub mod lease;
pub mod pool;
pub mod range;
pub mod reconcile;
pub mod store;
pub mod sync;

pub use address::{Address, ExternalRef, IpAddress};
pub use allocator::{Allocator, FirstFitAllocator, LinearScanAllocator};
pub use driver::{Driver, DriverFactory, ExternalAddress, NetBoxDriver, NetBoxDriverConfig};
pub use error::IpamError;
pub use pool::Pool;
pub use range::AddressRange;
pub use store::{KubePoolStore, PoolSnapshot, PoolStore};
#[cfg(any(test, feature = "test-util"))]
pub use store::MemoryPoolStore;
#[cfg(any(test, feature = "test-util"))]
pub use driver::MemoryDriver;
pub use sync::{sync, SyncReport, RESERVE_COUNT};
