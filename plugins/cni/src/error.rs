//! Plugin errors and their CNI error codes.

use ipam_core::IpamError;
use thiserror::Error;

/// Codes defined by the CNI specification.
pub mod code {
    pub const INCOMPATIBLE_VERSION: u32 = 1;
    pub const CONTAINER_UNKNOWN: u32 = 3;
    pub const INVALID_ENVIRONMENT: u32 = 4;
    pub const IO_FAILURE: u32 = 5;
    pub const DECODE_FAILURE: u32 = 6;
    pub const INVALID_NETWORK_CONFIG: u32 = 7;
    pub const TRY_AGAIN_LATER: u32 = 11;
    /// First plugin-specific code
    pub const POOL_EXHAUSTED: u32 = 100;
    pub const IPAM_FAILURE: u32 = 101;
}

/// Errors that end a plugin invocation.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("unsupported CNI version {0}")]
    IncompatibleVersion(String),

    #[error("invalid CNI environment: {0}")]
    Environment(String),

    #[error("failed to decode network configuration: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid network configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("container {container} holds no lease in pool {pool}")]
    NoLease { pool: String, container: String },

    #[error(transparent)]
    Ipam(#[from] IpamError),
}

impl PluginError {
    /// CNI error code reported to the runtime.
    pub fn code(&self) -> u32 {
        match self {
            PluginError::IncompatibleVersion(_) => code::INCOMPATIBLE_VERSION,
            PluginError::Environment(_) => code::INVALID_ENVIRONMENT,
            PluginError::Decode(_) => code::DECODE_FAILURE,
            PluginError::Config(_) | PluginError::Kubeconfig(_) => code::INVALID_NETWORK_CONFIG,
            PluginError::Io(_) => code::IO_FAILURE,
            PluginError::Kube(_) => code::TRY_AGAIN_LATER,
            PluginError::NoLease { .. } => code::CONTAINER_UNKNOWN,
            PluginError::Ipam(e) => match e {
                IpamError::Config(_) => code::INVALID_NETWORK_CONFIG,
                IpamError::PoolExhausted(_) => code::POOL_EXHAUSTED,
                e if e.is_retryable() => code::TRY_AGAIN_LATER,
                _ => code::IPAM_FAILURE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PluginError::Environment("CNI_COMMAND unset".into()).code(), 4);
        assert_eq!(PluginError::Config("mask".into()).code(), 7);
        assert_eq!(PluginError::Ipam(IpamError::PoolExhausted("default/pods".into())).code(), 100);
        assert_eq!(
            PluginError::Ipam(IpamError::Conflict {
                pool: "default/pods".into(),
                version: "12".into(),
            })
            .code(),
            11
        );
        assert_eq!(PluginError::Ipam(IpamError::Sync("bad lease".into())).code(), 101);

        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(PluginError::from(decode).code(), 6);
    }
}
