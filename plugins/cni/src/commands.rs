//! ADD / DEL / CHECK against the configured pool.

use std::sync::Arc;

use ipam_core::{lease, IpAddress, KubePoolStore, Pool, PoolStore};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use tracing::{debug, info};

use crate::config::{IpamConf, NetConf};
use crate::error::PluginError;
use crate::result::CniResult;

/// Connect to the cluster named by `ipam.kubeconfig` and open the pool.
pub async fn open_store(ipam: &IpamConf) -> Result<Arc<dyn PoolStore>, PluginError> {
    let kubeconfig = Kubeconfig::read_from(&ipam.kubeconfig)?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
    let namespace = ipam
        .pool_namespace
        .clone()
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| config.default_namespace.clone());
    debug!("Using IPPool {}/{} via {}", namespace, ipam.pool_name, ipam.kubeconfig);

    let client = Client::try_from(config)?;
    let api = Api::namespaced(client, &namespace);
    Ok(Arc::new(KubePoolStore::new(api, &namespace, ipam.pool_name.clone())))
}

/// Lease an address to the container and describe it to the runtime.
pub async fn add(store: Arc<dyn PoolStore>, conf: &NetConf, container_id: &str) -> Result<CniResult, PluginError> {
    // Parse routing first so a bad config never leaks a lease
    let network = conf.ipam.network()?;
    let ip = lease::allocate(store, container_id).await?;
    info!("Leased {} to container {}", ip, container_id);
    Ok(CniResult::for_lease(&conf.cni_version, ip, &network))
}

/// Drop the container's lease. Succeeds when there is none.
pub async fn del(store: Arc<dyn PoolStore>, container_id: &str) -> Result<(), PluginError> {
    if lease::release(store, container_id).await? {
        info!("Released lease of container {}", container_id);
    } else {
        debug!("Container {} held no lease", container_id);
    }
    Ok(())
}

/// Confirm the container still holds a lease.
pub async fn check(store: Arc<dyn PoolStore>, container_id: &str) -> Result<IpAddress, PluginError> {
    let pool = Pool::open(store).await?;
    pool.lease_of(container_id).ok_or_else(|| PluginError::NoLease {
        pool: pool.name().to_string(),
        container: container_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::IPPoolSpec;
    use ipam_core::MemoryPoolStore;

    fn conf() -> NetConf {
        NetConf::parse(
            br#"{"cniVersion": "1.0.0", "name": "pods", "ipam": {"kubeconfig": "/kc",
                 "poolName": "pods", "mask": "255.255.255.248", "gateway": "10.1.1.6"}}"#,
        )
        .unwrap()
    }

    fn store() -> MemoryPoolStore {
        MemoryPoolStore::new(
            "default/pods",
            IPPoolSpec {
                range: Some("10.1.1.0/29".to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_add_check_del() {
        let store = store();
        let shared: Arc<dyn PoolStore> = Arc::new(store.clone());

        let result = add(Arc::clone(&shared), &conf(), "c1").await.unwrap();
        assert_eq!(result.ips[0].address.to_string(), "10.1.1.1/29");
        assert_eq!(result.routes[0].gw.to_string(), "10.1.1.6");

        // Repeated ADD for the same container keeps the lease
        let again = add(Arc::clone(&shared), &conf(), "c1").await.unwrap();
        assert_eq!(again.ips, result.ips);
        assert_eq!(store.spec().allocations.len(), 1);

        assert_eq!(check(Arc::clone(&shared), "c1").await.unwrap().to_string(), "10.1.1.1");

        del(Arc::clone(&shared), "c1").await.unwrap();
        assert!(store.spec().allocations.is_empty());
        assert!(matches!(check(shared, "c1").await, Err(PluginError::NoLease { .. })));
    }

    #[tokio::test]
    async fn test_del_without_lease_succeeds() {
        let store = store();
        del(Arc::new(store.clone()), "never-added").await.unwrap();
        assert_eq!(store.persist_count(), 0);
    }

    #[tokio::test]
    async fn test_add_reports_exhaustion() {
        let store = MemoryPoolStore::new(
            "default/tiny",
            IPPoolSpec {
                addresses: vec!["10.1.1.2".to_string()],
                ..Default::default()
            },
        );
        let shared: Arc<dyn PoolStore> = Arc::new(store);
        add(Arc::clone(&shared), &conf(), "c1").await.unwrap();

        let err = add(shared, &conf(), "c2").await.unwrap_err();
        assert_eq!(err.code(), crate::error::code::POOL_EXHAUSTED);
    }
}
