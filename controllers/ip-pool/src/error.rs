//! Controller-specific error types.

use ipam_core::IpamError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the IPPool Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Pool allocation or sync error
    #[error(transparent)]
    Ipam(#[from] IpamError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Metrics server socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ControllerError {
    /// Whether another reconcile without a change to the pool can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::Ipam(IpamError::Config(_)) | ControllerError::InvalidConfig(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_not_retried() {
        assert!(!ControllerError::Ipam(IpamError::Config("bad rawConfig".into())).is_retryable());
        assert!(!ControllerError::InvalidConfig("no namespace".into()).is_retryable());
        assert!(ControllerError::Ipam(IpamError::Driver("502".into())).is_retryable());
        assert!(ControllerError::Ipam(IpamError::Sync("bad lease".into())).is_retryable());
    }
}
