//! IPPool watcher.
//!
//! Runs `kube_runtime::Controller` over `IPPool` resources, which handles
//! reconnection, per-object serialization and requeues.

use std::sync::Arc;
use std::time::Duration;

use crds::IPPool;
use futures::StreamExt;
use kube::Api;
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{watcher, Controller};
use tracing::{debug, error, info};

use crate::error::ControllerError;
use crate::reconciler::Reconciler;

/// Watches `IPPool` resources and drives their reconciliation.
#[derive(Clone)]
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    ip_pool_api: Api<IPPool>,
}

impl Watcher {
    pub fn new(reconciler: Arc<Reconciler>, ip_pool_api: Api<IPPool>) -> Self {
        Self { reconciler, ip_pool_api }
    }

    /// Watch pools until shutdown is signalled.
    pub async fn watch_ip_pools(&self) -> Result<(), ControllerError> {
        info!("Starting IPPool watcher");

        let reconcile = |pool: Arc<IPPool>, ctx: Arc<Reconciler>| async move {
            debug!("Reconciling IPPool {:?}", pool.metadata.name);
            ctx.reconcile_ip_pool(&pool).await
        };
        let error_policy =
            |pool: Arc<IPPool>, error: &ControllerError, ctx: Arc<Reconciler>| -> Action { ctx.error_action(&pool, error) };

        // Debounce batches the status write a cycle causes with the next
        // spec change; one pool is never reconciled twice at once.
        let controller_config = ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(4);

        Controller::new(self.ip_pool_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal()
            .run(reconcile, error_policy, Arc::clone(&self.reconciler))
            .for_each(|res| async move {
                match res {
                    Ok((obj, _action)) => debug!("Reconciled IPPool {}", obj),
                    Err(e) => error!("Controller error for IPPool: {}", e),
                }
            })
            .await;

        info!("IPPool watcher stopped");
        Ok(())
    }
}
