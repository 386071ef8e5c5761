//! IPPool CRD
//!
//! A pool is either range-based (`range` set, addresses computed on demand) or
//! list-based (`addresses` populated by the sync loop from an external IPAM).

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "ipam.microscaler.io",
    version = "v1alpha1",
    kind = "IPPool",
    namespaced,
    status = "IPPoolStatus",
    shortname = "ippool",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Total","type":"integer","jsonPath":".status.totalAddresses"}"#,
    printcolumn = r#"{"name":"Allocated","type":"integer","jsonPath":".status.allocatedAddresses"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolSpec {
    /// CIDR the pool scans linearly (e.g. "10.1.1.0/24").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,

    /// Candidate addresses, maintained by the sync loop for driver-backed pools.
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Live leases. At most one record per address and per consumer.
    #[serde(default)]
    pub allocations: Vec<IPAllocation>,

    /// External IPAM driver type (currently only "netbox").
    #[serde(default, rename = "type")]
    pub driver_type: String,

    /// Driver configuration, passed to the driver verbatim.
    #[serde(default)]
    pub raw_config: String,

    /// Allocation strategy. Defaults to linear scan for pure range pools and
    /// first-fit otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<AllocationStrategy>,
}

impl IPPoolSpec {
    /// Strategy actually used to pick addresses from this pool.
    #[must_use]
    pub fn effective_strategy(&self) -> AllocationStrategy {
        match &self.strategy {
            Some(strategy) => strategy.clone(),
            None if self.range.is_some() && self.addresses.is_empty() => {
                AllocationStrategy::LinearScan
            }
            None => AllocationStrategy::FirstFit,
        }
    }

    /// Whether the pool is kept in sync with an external IPAM.
    #[must_use]
    pub fn is_driver_backed(&self) -> bool {
        !self.driver_type.is_empty()
    }
}

/// A lease: `address` is held by the consumer identified by `consumer_id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IPAllocation {
    pub address: String,

    /// Opaque consumer identifier (the container id for CNI leases).
    #[serde(rename = "id")]
    pub consumer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationStrategy {
    /// First unallocated entry of `addresses`, in list order
    #[default]
    FirstFit,

    /// Walk `range` from its first usable address upward
    LinearScan,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IPPoolStatus {
    /// Candidate addresses known to the pool after the last sync
    pub total_addresses: u32,

    /// Leases recorded in the pool after the last sync
    pub allocated_addresses: u32,

    /// Time of the last status change written by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<chrono::DateTime<chrono::Utc>>,

    /// Error from the most recent sync, cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_wire_format() {
        let spec: IPPoolSpec = serde_json::from_str(
            r#"{"addresses":["10.1.1.2"],"allocations":[{"address":"10.1.1.2","id":"abc"}],"type":"netbox","rawConfig":"{}"}"#,
        )
        .unwrap();
        assert_eq!(spec.allocations[0].consumer_id, "abc");
        assert_eq!(spec.driver_type, "netbox");
        assert!(spec.is_driver_backed());

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["allocations"][0]["id"], "abc");
        assert_eq!(json["type"], "netbox");
        assert!(json.get("range").is_none());
    }

    #[test]
    fn test_effective_strategy() {
        let range_pool = IPPoolSpec {
            range: Some("10.1.1.0/24".to_string()),
            ..Default::default()
        };
        assert_eq!(range_pool.effective_strategy(), AllocationStrategy::LinearScan);

        let list_pool = IPPoolSpec {
            addresses: vec!["10.1.1.2".to_string()],
            ..Default::default()
        };
        assert_eq!(list_pool.effective_strategy(), AllocationStrategy::FirstFit);

        let explicit = IPPoolSpec {
            range: Some("10.1.1.0/24".to_string()),
            strategy: Some(AllocationStrategy::FirstFit),
            ..Default::default()
        };
        assert_eq!(explicit.effective_strategy(), AllocationStrategy::FirstFit);
    }

    #[test]
    fn test_strategy_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&AllocationStrategy::LinearScan).unwrap(),
            "\"linear-scan\""
        );
    }
}
