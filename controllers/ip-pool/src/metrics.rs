//! Prometheus metrics and the probe/metrics HTTP endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use ipam_core::SyncReport;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::ControllerError;

/// Sync outcomes, by pool.
pub struct Metrics {
    registry: Registry,
    syncs: IntCounterVec,
    mutations: IntCounterVec,
    addresses: IntGaugeVec,
    allocated: IntGaugeVec,
    orphaned: IntGaugeVec,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Result<Self, ControllerError> {
        let registry = Registry::new();

        let syncs = IntCounterVec::new(
            Opts::new("ippool_sync_total", "IPPool reconcile cycles by result"),
            &["result"],
        )?;
        let mutations = IntCounterVec::new(
            Opts::new("ippool_driver_mutations_total", "Changes pushed to the external IPAM by kind"),
            &["kind"],
        )?;
        let addresses = IntGaugeVec::new(
            Opts::new("ippool_addresses", "Addresses known to the pool"),
            &["pool"],
        )?;
        let allocated = IntGaugeVec::new(
            Opts::new("ippool_allocated_addresses", "Addresses leased from the pool"),
            &["pool"],
        )?;
        let orphaned = IntGaugeVec::new(
            Opts::new("ippool_orphaned_allocations", "Leases whose address is missing from the external IPAM"),
            &["pool"],
        )?;

        registry.register(Box::new(syncs.clone()))?;
        registry.register(Box::new(mutations.clone()))?;
        registry.register(Box::new(addresses.clone()))?;
        registry.register(Box::new(allocated.clone()))?;
        registry.register(Box::new(orphaned.clone()))?;

        Ok(Self {
            registry,
            syncs,
            mutations,
            addresses,
            allocated,
            orphaned,
        })
    }

    /// Record a finished sync of `pool`.
    pub fn record_sync(&self, pool: &str, report: &SyncReport) {
        self.syncs.with_label_values(&["ok"]).inc();
        for (kind, count) in [
            ("created", report.created),
            ("deleted", report.deleted),
            ("marked_allocated", report.marked_allocated),
            ("marked_released", report.marked_released),
        ] {
            self.mutations.with_label_values(&[kind]).inc_by(count as u64);
        }
        self.record_counts(pool, report.total_addresses, report.allocated_addresses);
        self.orphaned
            .with_label_values(&[pool])
            .set(i64::try_from(report.orphaned_allocations.len()).unwrap_or(i64::MAX));
    }

    /// Record the address counts of `pool` without a sync.
    pub fn record_counts(&self, pool: &str, total: usize, allocated: usize) {
        self.addresses
            .with_label_values(&[pool])
            .set(i64::try_from(total).unwrap_or(i64::MAX));
        self.allocated
            .with_label_values(&[pool])
            .set(i64::try_from(allocated).unwrap_or(i64::MAX));
    }

    pub fn record_skipped(&self) {
        self.syncs.with_label_values(&["skipped"]).inc();
    }

    pub fn record_error(&self) {
        self.syncs.with_label_values(&["error"]).inc();
    }

    /// Render every metric in the text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> Result<String, StatusCode> {
    metrics.render().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn health_check() -> &'static str {
    "ok"
}

/// Router serving `/metrics` and `/healthz`.
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve [`router`] on `addr` until the process exits.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving metrics on http://{}", addr);
    axum::serve(listener, router(metrics)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use crds::IPAllocation;
    use tower::ServiceExt;

    #[test]
    fn test_record_sync_exports_counts() {
        let metrics = Metrics::new().unwrap();
        metrics.record_sync(
            "default/edge",
            &SyncReport {
                created: 2,
                marked_allocated: 1,
                orphaned_allocations: vec![IPAllocation {
                    address: "10.1.1.9".to_string(),
                    consumer_id: "c9".to_string(),
                }],
                total_addresses: 4,
                allocated_addresses: 1,
                ..Default::default()
            },
        );
        metrics.record_error();

        let text = metrics.render().unwrap();
        assert!(text.contains("ippool_sync_total{result=\"ok\"} 1"));
        assert!(text.contains("ippool_sync_total{result=\"error\"} 1"));
        assert!(text.contains("ippool_driver_mutations_total{kind=\"created\"} 2"));
        assert!(text.contains("ippool_addresses{pool=\"default/edge\"} 4"));
        assert!(text.contains("ippool_orphaned_allocations{pool=\"default/edge\"} 1"));
    }

    #[tokio::test]
    async fn test_router_serves_metrics_and_health() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_skipped();
        let app = router(metrics);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
