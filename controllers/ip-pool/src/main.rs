//! IPPool Controller
//!
//! Watches `IPPool` resources whose `type` names an external IPAM driver and
//! keeps their address inventory in sync with it:
//! - tops the external inventory up to one free address beyond the leases
//! - removes surplus automated addresses nobody holds
//! - pushes lease state out as `allocated` tags
//! - reports counts and the last error on the pool status

mod backoff;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod watcher;

use std::env;
use std::net::SocketAddr;

use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ControllerError;

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both pull rustls; pick the provider once for the process
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting IPPool Controller");

    let namespace = env::var("WATCH_NAMESPACE").ok().filter(|ns| !ns.is_empty());
    let metrics_addr: SocketAddr = env::var("METRICS_ADDR")
        .unwrap_or_else(|_| DEFAULT_METRICS_ADDR.to_string())
        .parse()
        .map_err(|e| ControllerError::InvalidConfig(format!("METRICS_ADDR: {e}")))?;

    info!("Configuration:");
    info!("  Namespace: {}", namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics address: {}", metrics_addr);

    let controller = Controller::new(namespace, metrics_addr).await?;
    controller.run().await?;

    Ok(())
}
