use tracing::debug;

use super::{Driver, NetBoxDriver, NetBoxDriverConfig};
use crate::error::IpamError;

pub const NETBOX_DRIVER: &str = "netbox";

/// Creates drivers from a pool's `type` and `rawConfig`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverFactory;

impl DriverFactory {
    pub fn create(driver_type: &str, raw_config: &str) -> Result<Box<dyn Driver>, IpamError> {
        debug!("Creating IPAM driver of type {:?}", driver_type);
        match driver_type {
            NETBOX_DRIVER => {
                let config = NetBoxDriverConfig::from_raw(raw_config)?;
                Ok(Box::new(NetBoxDriver::new(config)?))
            }
            other => Err(IpamError::Config(format!("driver type {other:?} not implemented"))),
        }
    }
}
