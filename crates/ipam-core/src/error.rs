//! IPAM errors

use std::time::Duration;

use netbox_client::NetBoxError;
use thiserror::Error;

use crate::address::IpAddress;

/// Errors raised by pool allocation, release and sync
#[derive(Debug, Error)]
pub enum IpamError {
    /// Malformed range, address, driver config or unknown driver type
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The address is outside the pool or already leased
    #[error("address {address} is not available in pool {pool}")]
    AddressUnavailable { pool: String, address: IpAddress },

    /// No free candidate left
    #[error("no free address left in pool {0}")]
    PoolExhausted(String),

    /// The pool record could not be read or written
    #[error("pool store error: {0}")]
    BackingStore(String),

    /// The pool record changed since it was read
    #[error("pool {pool} was modified concurrently (expected version {version})")]
    Conflict { pool: String, version: String },

    /// The external IPAM refused an operation
    #[error("IPAM driver error: {0}")]
    Driver(String),

    /// Transport or API failure talking to NetBox
    #[error("NetBox request failed: {0}")]
    NetBox(#[from] NetBoxError),

    /// A driver call exceeded its deadline
    #[error("IPAM driver call {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Pool records could not be reconciled with the external inventory
    #[error("sync failed: {0}")]
    Sync(String),
}

impl IpamError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IpamError::BackingStore(_)
                | IpamError::Conflict { .. }
                | IpamError::Driver(_)
                | IpamError::NetBox(_)
                | IpamError::Timeout { .. }
        )
    }

    /// Whether the error came from the external IPAM side.
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self,
            IpamError::Driver(_) | IpamError::NetBox(_) | IpamError::Timeout { .. }
        )
    }
}
