//! JSON written to stdout for the runtime.

use std::net::Ipv4Addr;

use ipam_core::IpAddress;
use ipnet::Ipv4Net;
use serde::Serialize;

use crate::config::{NetworkSettings, SUPPORTED_VERSIONS};

/// Successful ADD result.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CniResult {
    pub cni_version: String,
    pub ips: Vec<IpConfig>,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IpConfig {
    /// "4"; only pre-1.0 results carry it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<&'static str>,
    pub address: Ipv4Net,
    pub gateway: Ipv4Addr,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Route {
    pub dst: Ipv4Net,
    pub gw: Ipv4Addr,
}

impl CniResult {
    /// Result for a leased address: the address itself, a default route via
    /// the gateway and the configured static routes.
    pub fn for_lease(cni_version: &str, ip: IpAddress, network: &NetworkSettings) -> Self {
        // prefix_len is validated to be <= 32 when the config is parsed
        let address = Ipv4Net::new(ip.into(), network.prefix_len)
            .unwrap_or_else(|_| Ipv4Net::from(Ipv4Addr::from(ip)));

        let mut routes = vec![Route {
            dst: Ipv4Net::default(),
            gw: network.gateway,
        }];
        routes.extend(network.routes.iter().map(|dst| Route {
            dst: *dst,
            gw: network.gateway,
        }));

        Self {
            cni_version: cni_version.to_string(),
            ips: vec![IpConfig {
                version: cni_version.starts_with("0.").then_some("4"),
                address,
                gateway: network.gateway,
            }],
            routes,
        }
    }
}

/// Error object printed on failure.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    pub cni_version: String,
    pub code: u32,
    pub msg: String,
}

/// Answer to VERSION.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionResult {
    pub cni_version: String,
    pub supported_versions: Vec<&'static str>,
}

impl VersionResult {
    pub fn new(cni_version: &str) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            supported_versions: SUPPORTED_VERSIONS.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn network() -> NetworkSettings {
        NetworkSettings {
            prefix_len: 24,
            gateway: Ipv4Addr::new(10, 1, 1, 1),
            routes: vec!["10.96.0.0/12".parse().unwrap()],
        }
    }

    #[test]
    fn test_result_for_lease() {
        let result = CniResult::for_lease("1.0.0", "10.1.1.7".parse().unwrap(), &network());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "cniVersion": "1.0.0",
                "ips": [{"address": "10.1.1.7/24", "gateway": "10.1.1.1"}],
                "routes": [
                    {"dst": "0.0.0.0/0", "gw": "10.1.1.1"},
                    {"dst": "10.96.0.0/12", "gw": "10.1.1.1"}
                ]
            })
        );
    }

    #[test]
    fn test_pre_1_0_results_carry_ip_version() {
        let result = CniResult::for_lease("0.3.1", "10.1.1.7".parse().unwrap(), &network());
        assert_eq!(result.ips[0].version, Some("4"));
        assert_eq!(serde_json::to_value(&result).unwrap()["ips"][0]["version"], "4");
    }

    #[test]
    fn test_error_and_version_shapes() {
        let error = ErrorResult {
            cni_version: "1.0.0".to_string(),
            code: 11,
            msg: "try again".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&error).unwrap(),
            json!({"cniVersion": "1.0.0", "code": 11, "msg": "try again"})
        );

        let version = serde_json::to_value(VersionResult::new("1.0.0")).unwrap();
        assert_eq!(version["supportedVersions"][0], "0.3.0");
    }
}
