//! IPPool reconciliation.
//!
//! One cycle per pool: sync against the pool's driver through
//! [`ipam_core::reconcile::run_cycle`], then mirror the outcome onto the pool
//! status. Failed cycles are retried with a per-pool Fibonacci backoff.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use crds::{IPPool, IPPoolSpec, IPPoolStatus};
use ipam_core::reconcile::{default_resolver, run_cycle, DriverResolver, RESYNC_INTERVAL, RETRY_DELAY};
use ipam_core::{AddressRange, KubePoolStore};
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::backoff::FibonacciBackoff;
use crate::error::ControllerError;
use crate::metrics::Metrics;

/// Longest delay between retries of a failing pool.
const MAX_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::from_durations(RETRY_DELAY, MAX_RETRY_DELAY),
            error_count: 0,
        }
    }
}

/// Reconciles `IPPool` resources.
pub struct Reconciler {
    client: Client,
    resolve: Box<DriverResolver>,
    metrics: Arc<Metrics>,
    /// namespace/name -> BackoffState
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(client: Client, metrics: Arc<Metrics>) -> Self {
        Self {
            client,
            resolve: default_resolver(),
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reconcile one pool.
    pub async fn reconcile_ip_pool(&self, pool: &IPPool) -> Result<Action, ControllerError> {
        let name = pool.name_any();
        let namespace = pool
            .namespace()
            .ok_or_else(|| ControllerError::InvalidConfig(format!("IPPool {name} has no namespace")))?;
        let key = format!("{namespace}/{name}");
        let api: Api<IPPool> = Api::namespaced(self.client.clone(), &namespace);
        let store = KubePoolStore::new(api.clone(), &namespace, &name);

        match run_cycle(&store, self.resolve.as_ref()).await {
            Ok(Some(report)) => {
                if report.mutations() > 0 {
                    info!(
                        "Synced IPPool {}: created {}, deleted {}, marked allocated {}, marked released {}",
                        key, report.created, report.deleted, report.marked_allocated, report.marked_released
                    );
                } else {
                    debug!("IPPool {} already in sync", key);
                }
                for orphan in &report.orphaned_allocations {
                    warn!(
                        "IPPool {}: lease {} held by {} is missing from the external IPAM",
                        key, orphan.address, orphan.consumer_id
                    );
                }
                self.metrics.record_sync(&key, &report);
                self.reset_error(&key);

                let observed = ObservedStatus {
                    total: report.total_addresses,
                    allocated: report.allocated_addresses,
                    error: None,
                };
                self.update_status(&api, pool, &observed).await?;
                Ok(Action::requeue(RESYNC_INTERVAL))
            }
            Ok(None) => {
                // No driver: the pool is a plain cluster-side address space.
                let (total, allocated) = local_counts(&pool.spec);
                self.metrics.record_skipped();
                self.metrics.record_counts(&key, total, allocated);
                self.reset_error(&key);

                let observed = ObservedStatus { total, allocated, error: None };
                self.update_status(&api, pool, &observed).await?;
                Ok(Action::await_change())
            }
            Err(e) => {
                self.metrics.record_error();
                let (total, allocated) = local_counts(&pool.spec);
                let observed = ObservedStatus {
                    total,
                    allocated,
                    error: Some(e.to_string()),
                };
                if let Err(status_error) = self.update_status(&api, pool, &observed).await {
                    warn!("Failed to record error on IPPool {} status: {}", key, status_error);
                }
                Err(e.into())
            }
        }
    }

    async fn update_status(&self, api: &Api<IPPool>, pool: &IPPool, observed: &ObservedStatus) -> Result<(), ControllerError> {
        if !status_needs_update(pool.status.as_ref(), observed) {
            return Ok(());
        }

        let status = IPPoolStatus {
            total_addresses: saturating_u32(observed.total),
            allocated_addresses: saturating_u32(observed.allocated),
            last_synced: if observed.error.is_none() {
                Some(Utc::now())
            } else {
                pool.status.as_ref().and_then(|s| s.last_synced)
            },
            error: observed.error.clone(),
        };
        let status_patch = json!({ "status": status });
        api.patch_status(&pool.name_any(), &PatchParams::default(), &Patch::Merge(&status_patch))
            .await?;
        debug!("Updated IPPool {} status", pool.name_any());
        Ok(())
    }

    /// Next retry delay for a failing pool, advancing its backoff.
    pub fn backoff_for(&self, resource_key: &str) -> (std::time::Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(resource_key.to_string()).or_insert_with(BackoffState::new);
                state.error_count = state.error_count.saturating_add(1);
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (RETRY_DELAY, 0)
            }
        }
    }

    fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if states.remove(resource_key).is_some() {
                debug!("Reset backoff for {}", resource_key);
            }
        }
    }

    /// Requeue action after a failed reconcile.
    pub fn error_action(&self, pool: &IPPool, error: &ControllerError) -> Action {
        let key = format!("{}/{}", pool.namespace().unwrap_or_default(), pool.name_any());
        if !error.is_retryable() {
            error!("IPPool {} is misconfigured, waiting for a change: {}", key, error);
            return Action::await_change();
        }
        let (delay, error_count) = self.backoff_for(&key);
        error!(
            "Reconciling IPPool {} failed (attempt {}), retrying in {:?}: {}",
            key, error_count, delay, error
        );
        Action::requeue(delay)
    }
}

/// Status values derived from one reconcile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedStatus {
    pub total: usize,
    pub allocated: usize,
    pub error: Option<String>,
}

/// Whether the stored status differs from what was just observed.
///
/// `lastSynced` alone never triggers a write, so a converged pool does not
/// generate status events on every resync.
pub fn status_needs_update(current: Option<&IPPoolStatus>, observed: &ObservedStatus) -> bool {
    match current {
        None => true,
        Some(status) => {
            status.total_addresses != saturating_u32(observed.total)
                || status.allocated_addresses != saturating_u32(observed.allocated)
                || status.error != observed.error
                || (observed.error.is_none() && status.last_synced.is_none())
        }
    }
}

/// Address and lease counts taken from the pool record alone.
fn local_counts(spec: &IPPoolSpec) -> (usize, usize) {
    let total = if spec.addresses.is_empty() {
        spec.range
            .as_deref()
            .and_then(|r| r.parse::<AddressRange>().ok())
            .map_or(0, |r| usize::try_from(r.usable_count()).unwrap_or(usize::MAX))
    } else {
        spec.addresses.len()
    };
    (total, spec.allocations.len())
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::IPAllocation;

    fn observed(total: usize, allocated: usize, error: Option<&str>) -> ObservedStatus {
        ObservedStatus {
            total,
            allocated,
            error: error.map(str::to_string),
        }
    }

    fn synced(total: u32, allocated: u32) -> IPPoolStatus {
        IPPoolStatus {
            total_addresses: total,
            allocated_addresses: allocated,
            last_synced: Some(Utc::now()),
            error: None,
        }
    }

    #[test]
    fn test_status_written_when_missing() {
        assert!(status_needs_update(None, &observed(0, 0, None)));
    }

    #[test]
    fn test_status_unchanged_is_not_rewritten() {
        assert!(!status_needs_update(Some(&synced(3, 2)), &observed(3, 2, None)));
    }

    #[test]
    fn test_status_counts_and_errors_trigger_update() {
        let current = synced(3, 2);
        assert!(status_needs_update(Some(&current), &observed(4, 2, None)));
        assert!(status_needs_update(Some(&current), &observed(3, 3, None)));
        assert!(status_needs_update(Some(&current), &observed(3, 2, Some("NetBox request failed"))));

        let failed = IPPoolStatus {
            error: Some("NetBox request failed".to_string()),
            ..synced(3, 2)
        };
        assert!(status_needs_update(Some(&failed), &observed(3, 2, None)));
        assert!(!status_needs_update(Some(&failed), &observed(3, 2, Some("NetBox request failed"))));
    }

    #[test]
    fn test_local_counts() {
        let range_only = IPPoolSpec {
            range: Some("10.1.1.0/29".to_string()),
            allocations: vec![IPAllocation {
                address: "10.1.1.1".to_string(),
                consumer_id: "c1".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(local_counts(&range_only), (6, 1));

        let listed = IPPoolSpec {
            range: Some("10.1.1.0/24".to_string()),
            addresses: vec!["10.1.1.2".to_string(), "10.1.1.3".to_string()],
            ..Default::default()
        };
        assert_eq!(local_counts(&listed), (2, 0));

        let broken = IPPoolSpec {
            range: Some("not-a-cidr".to_string()),
            ..Default::default()
        };
        assert_eq!(local_counts(&broken), (0, 0));
    }
}
