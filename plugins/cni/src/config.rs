//! Network configuration from stdin and the CNI environment.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Deserialize;

use crate::error::PluginError;

/// CNI versions this plugin can answer.
pub const SUPPORTED_VERSIONS: &[&str] = &["0.3.0", "0.3.1", "0.4.0", "1.0.0", "1.1.0"];

/// Version reported when the configuration could not be read.
pub const DEFAULT_CNI_VERSION: &str = "1.0.0";

/// Network configuration passed on stdin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetConf {
    pub cni_version: String,
    #[serde(default)]
    pub name: String,
    pub ipam: IpamConf,
}

/// The `ipam` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpamConf {
    /// Path to the kubeconfig used to reach the pool
    #[serde(alias = "configPath")]
    pub kubeconfig: String,
    pub pool_name: String,
    /// Defaults to the kubeconfig context namespace
    #[serde(default)]
    pub pool_namespace: Option<String>,
    /// Dotted netmask ("255.255.255.0") or prefix length ("24")
    pub mask: String,
    pub gateway: String,
    /// Extra destinations routed through `gateway`
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub log_file: Option<String>,
}

/// Parsed addressing settings handed back to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub prefix_len: u8,
    pub gateway: Ipv4Addr,
    pub routes: Vec<Ipv4Net>,
}

impl NetConf {
    /// Decode and validate the stdin configuration.
    pub fn parse(bytes: &[u8]) -> Result<Self, PluginError> {
        let conf: NetConf = serde_json::from_slice(bytes)?;
        conf.validate()?;
        Ok(conf)
    }

    fn validate(&self) -> Result<(), PluginError> {
        if !SUPPORTED_VERSIONS.contains(&self.cni_version.as_str()) {
            return Err(PluginError::IncompatibleVersion(self.cni_version.clone()));
        }
        if self.ipam.kubeconfig.is_empty() {
            return Err(PluginError::Config("ipam.kubeconfig is required".to_string()));
        }
        if self.ipam.pool_name.is_empty() {
            return Err(PluginError::Config("ipam.poolName is required".to_string()));
        }
        self.ipam.network().map(|_| ())
    }
}

impl IpamConf {
    /// Parse mask, gateway and routes.
    pub fn network(&self) -> Result<NetworkSettings, PluginError> {
        let prefix_len = parse_mask(&self.mask)?;
        let gateway: Ipv4Addr = self
            .gateway
            .parse()
            .map_err(|e| PluginError::Config(format!("ipam.gateway {:?}: {e}", self.gateway)))?;
        let routes = self
            .routes
            .iter()
            .map(|route| {
                route
                    .parse::<Ipv4Net>()
                    .map(|net| net.trunc())
                    .map_err(|e| PluginError::Config(format!("ipam.routes entry {route:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(NetworkSettings {
            prefix_len,
            gateway,
            routes,
        })
    }
}

fn parse_mask(mask: &str) -> Result<u8, PluginError> {
    if let Ok(prefix_len) = mask.parse::<u8>() {
        if prefix_len <= 32 {
            return Ok(prefix_len);
        }
    }
    let dotted: Ipv4Addr = mask
        .parse()
        .map_err(|e| PluginError::Config(format!("ipam.mask {mask:?}: {e}")))?;
    ipnet::ipv4_mask_to_prefix(dotted).map_err(|e| PluginError::Config(format!("ipam.mask {mask:?}: {e}")))
}

/// CNI operation requested by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Del,
    Check,
    Version,
}

/// The `CNI_*` variables of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CniEnv {
    pub command: Command,
    /// Lease owner; required for everything but VERSION
    pub container_id: String,
    pub ifname: Option<String>,
}

impl CniEnv {
    pub fn from_env() -> Result<Self, PluginError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PluginError> {
        let command = match lookup("CNI_COMMAND").as_deref() {
            Some("ADD") => Command::Add,
            Some("DEL") => Command::Del,
            Some("CHECK") => Command::Check,
            Some("VERSION") => Command::Version,
            Some(other) => return Err(PluginError::Environment(format!("unknown CNI_COMMAND {other:?}"))),
            None => return Err(PluginError::Environment("CNI_COMMAND is not set".to_string())),
        };

        let container_id = lookup("CNI_CONTAINERID").unwrap_or_default();
        if command != Command::Version && container_id.is_empty() {
            return Err(PluginError::Environment("CNI_CONTAINERID is not set".to_string()));
        }

        Ok(Self {
            command,
            container_id,
            ifname: lookup("CNI_IFNAME").filter(|s| !s.is_empty()),
        })
    }
}
