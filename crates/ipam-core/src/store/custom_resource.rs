//! IPPool custom resources as the pool store

use async_trait::async_trait;
use crds::{IPPool, IPPoolSpec};
use kube::api::{Api, Patch, PatchParams};
use serde_json::json;
use tracing::debug;

use super::{PoolSnapshot, PoolStore};
use crate::error::IpamError;

/// Stores one pool in one `IPPool` object.
///
/// Writes are JSON merge patches carrying `metadata.resourceVersion`, which the
/// API server enforces as a precondition and answers with 409 on mismatch.
pub struct KubePoolStore {
    api: Api<IPPool>,
    name: String,
    display: String,
}

impl KubePoolStore {
    pub fn new(api: Api<IPPool>, namespace: &str, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            api,
            display: format!("{namespace}/{name}"),
            name,
        }
    }

    fn map_error(&self, error: kube::Error, version: Option<&str>) -> IpamError {
        match error {
            kube::Error::Api(ref response) if response.code == 409 => IpamError::Conflict {
                pool: self.display.clone(),
                version: version.unwrap_or_default().to_string(),
            },
            kube::Error::Api(ref response) if response.code == 404 => {
                IpamError::BackingStore(format!("IPPool {} not found", self.display))
            }
            other => IpamError::BackingStore(format!("IPPool {}: {other}", self.display)),
        }
    }
}

#[async_trait]
impl PoolStore for KubePoolStore {
    fn pool_name(&self) -> &str {
        &self.display
    }

    async fn fetch(&self) -> Result<PoolSnapshot, IpamError> {
        let pool = self
            .api
            .get(&self.name)
            .await
            .map_err(|e| self.map_error(e, None))?;

        Ok(PoolSnapshot {
            version: pool.metadata.resource_version.clone().unwrap_or_default(),
            spec: pool.spec,
        })
    }

    async fn persist(&self, spec: &IPPoolSpec, expected_version: &str) -> Result<String, IpamError> {
        debug!(pool = %self.display, version = expected_version, "Persisting pool record");
        let patch = json!({
            "metadata": { "resourceVersion": expected_version },
            "spec": spec,
        });

        let updated = self
            .api
            .patch(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| self.map_error(e, Some(expected_version)))?;

        Ok(updated.metadata.resource_version.unwrap_or_default())
    }
}
