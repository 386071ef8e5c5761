//! Controller wiring: Kubernetes client, IPPool watcher and metrics server.

use std::net::SocketAddr;
use std::sync::Arc;

use crds::IPPool;
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::ControllerError;
use crate::metrics::{self, Metrics};
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;

/// Main controller that runs every background task.
#[derive(Debug)]
pub struct Controller {
    ip_pool_watcher: JoinHandle<Result<(), ControllerError>>,
    metrics_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Connect to the cluster and start the tasks.
    pub async fn new(namespace: Option<String>, metrics_addr: SocketAddr) -> Result<Self, ControllerError> {
        info!("Initializing IPPool Controller");

        let kube_client = Client::try_default().await?;
        let ip_pool_api: Api<IPPool> = match namespace.as_deref() {
            Some(ns) => Api::namespaced(kube_client.clone(), ns),
            None => Api::all(kube_client.clone()),
        };

        let metrics = Arc::new(Metrics::new()?);
        let reconciler = Arc::new(Reconciler::new(kube_client, Arc::clone(&metrics)));
        let watcher = Watcher::new(reconciler, ip_pool_api);

        let ip_pool_watcher = tokio::spawn(async move { watcher.watch_ip_pools().await });
        let metrics_server = tokio::spawn(metrics::serve(metrics_addr, metrics));

        Ok(Self {
            ip_pool_watcher,
            metrics_server,
        })
    }

    /// Run until a task stops. A stopped watcher ends the process.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("IPPool Controller running");

        let (task, outcome) = tokio::select! {
            res = self.ip_pool_watcher => ("IPPool watcher", res),
            res = self.metrics_server => ("metrics server", res),
        };

        match outcome {
            Ok(Ok(())) => {
                info!("{} stopped", task);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("{} failed: {}", task, e);
                Err(e)
            }
            Err(join_error) => {
                error!("{} panicked: {}", task, join_error);
                Err(ControllerError::Watch(format!("{task} task failed: {join_error}")))
            }
        }
    }
}
