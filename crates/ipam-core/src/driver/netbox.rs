//! NetBox-backed driver
//!
//! Pool membership is the `pool-<poolIdentifier>` tag, lease state is the
//! `allocated` tag plus the consumer id in the address description. New
//! addresses are carved out of `networkPrefix` through the prefix's
//! available-ips endpoint, so NetBox decides which hosts are free.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::Ipv4Net;
use netbox_client::{
    IPAddress, IPAddressRequest, IPAddressStatus, NetBoxClient, NetBoxClientTrait, NetBoxError,
    TagRef,
};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{pool_tag, Driver, ExternalAddress, TAG_ALLOCATED, TAG_AUTOMATED};
use crate::address::{ExternalRef, IpAddress};
use crate::error::IpamError;

const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Driver settings, read from the pool's `rawConfig`.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetBoxDriverConfig {
    /// NetBox base URL
    pub host: String,
    pub api_key: String,
    /// Log every NetBox call at info level
    #[serde(default)]
    pub debug: bool,
    /// Prefix new addresses are created in (e.g. "10.1.1.0/24")
    pub network_prefix: String,
    /// Suffix of the pool tag
    pub pool_identifier: String,
    /// Deadline for each NetBox call
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl fmt::Debug for NetBoxDriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetBoxDriverConfig")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .field("debug", &self.debug)
            .field("network_prefix", &self.network_prefix)
            .field("pool_identifier", &self.pool_identifier)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl NetBoxDriverConfig {
    /// Parse and validate a raw JSON config.
    pub fn from_raw(raw: &str) -> Result<Self, IpamError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| IpamError::Config(format!("invalid NetBox driver config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), IpamError> {
        if self.host.trim().is_empty() {
            return Err(IpamError::Config("NetBox driver config: host is empty".to_string()));
        }
        if self.pool_identifier.trim().is_empty() {
            return Err(IpamError::Config(
                "NetBox driver config: poolIdentifier is empty".to_string(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(IpamError::Config(
                "NetBox driver config: timeoutSeconds must be positive".to_string(),
            ));
        }
        self.network_prefix.parse::<Ipv4Net>().map_err(|e| {
            IpamError::Config(format!(
                "NetBox driver config: networkPrefix {:?} is not an IPv4 CIDR: {e}",
                self.network_prefix
            ))
        })?;
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

pub struct NetBoxDriver {
    client: Box<dyn NetBoxClientTrait>,
    config: NetBoxDriverConfig,
    pool_tag: String,
    tags_ready: OnceCell<()>,
}

impl fmt::Debug for NetBoxDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetBoxDriver")
            .field("netbox", &self.client.base_url())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NetBoxDriver {
    pub fn new(config: NetBoxDriverConfig) -> Result<Self, IpamError> {
        let client = NetBoxClient::new(config.host.clone(), config.api_key.clone())?;
        Ok(Self::with_client(config, Box::new(client)))
    }

    /// Build a driver around an existing client (tests use the mock).
    pub fn with_client(config: NetBoxDriverConfig, client: Box<dyn NetBoxClientTrait>) -> Self {
        Self {
            pool_tag: pool_tag(&config.pool_identifier),
            client,
            config,
            tags_ready: OnceCell::new(),
        }
    }

    async fn call<T, F>(&self, operation: &'static str, request: F) -> Result<T, IpamError>
    where
        F: Future<Output = Result<T, NetBoxError>> + Send,
    {
        if self.config.debug {
            info!(pool = %self.config.pool_identifier, operation, "NetBox call");
        } else {
            debug!(pool = %self.config.pool_identifier, operation, "NetBox call");
        }

        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result.map_err(IpamError::from),
            Err(_elapsed) => Err(IpamError::Timeout { operation, timeout }),
        }
    }

    /// NetBox only accepts existing tags on writes; create ours once.
    async fn ensure_tags(&self) -> Result<(), IpamError> {
        self.tags_ready
            .get_or_try_init(|| async {
                for slug in [self.pool_tag.as_str(), TAG_AUTOMATED, TAG_ALLOCATED] {
                    let existing = self
                        .call("query_tags", self.client.query_tags(&[("slug", slug)], false))
                        .await?;
                    if existing.is_empty() {
                        info!(slug, "Creating NetBox tag");
                        self.call(
                            "create_tag",
                            self.client.create_tag(slug, slug, Some("Managed by pod IPAM")),
                        )
                        .await?;
                    }
                }
                Ok::<(), IpamError>(())
            })
            .await?;
        Ok(())
    }

    fn to_external(&self, record: &IPAddress) -> Option<ExternalAddress> {
        match record.address.parse::<IpAddress>() {
            Ok(ip) => Some(ExternalAddress {
                external_ref: ExternalRef::new(record.id),
                ip,
                tags: record.tag_slugs().map(str::to_string).collect(),
                annotation: record.description.clone(),
            }),
            Err(e) => {
                warn!(pool = %self.config.pool_identifier, id = record.id, "Ignoring NetBox address: {}", e);
                None
            }
        }
    }

    async fn retag(
        &self,
        address: &ExternalAddress,
        tags: &BTreeSet<String>,
        annotation: &str,
    ) -> Result<(), IpamError> {
        self.ensure_tags().await?;
        let request = IPAddressRequest {
            description: Some(annotation.to_string()),
            tags: Some(tags.iter().map(TagRef::new).collect()),
            ..Default::default()
        };
        self.call(
            "update_ip_address",
            self.client.update_ip_address(address.external_ref.get(), request),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Driver for NetBoxDriver {
    fn pool_id(&self) -> &str {
        &self.config.pool_identifier
    }

    async fn list_addresses(&self) -> Result<Vec<ExternalAddress>, IpamError> {
        let records = self
            .call(
                "query_ip_addresses",
                self.client.query_ip_addresses(&[("tag", self.pool_tag.as_str())], true),
            )
            .await?;
        Ok(records.iter().filter_map(|r| self.to_external(r)).collect())
    }

    async fn mark_allocated(&self, address: &ExternalAddress, consumer: &str) -> Result<(), IpamError> {
        if address.is_leased_to(consumer) {
            return Ok(());
        }
        let mut tags = address.tags.clone();
        tags.insert(TAG_ALLOCATED.to_string());
        tags.insert(self.pool_tag.clone());
        self.retag(address, &tags, consumer).await
    }

    async fn mark_released(&self, address: &ExternalAddress) -> Result<(), IpamError> {
        if !address.is_allocated() {
            return Ok(());
        }
        let mut tags = address.tags.clone();
        tags.remove(TAG_ALLOCATED);
        self.retag(address, &tags, "").await
    }

    async fn create_addresses(&self, count: usize) -> Result<Vec<ExternalAddress>, IpamError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.ensure_tags().await?;

        let prefix = self
            .call(
                "query_prefixes",
                self.client
                    .query_prefixes(&[("prefix", self.config.network_prefix.as_str())], false),
            )
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                IpamError::Driver(format!(
                    "prefix {} not found in NetBox",
                    self.config.network_prefix
                ))
            })?;

        let request = IPAddressRequest {
            status: Some(IPAddressStatus::Active),
            tags: Some(vec![TagRef::new(&self.pool_tag), TagRef::new(TAG_AUTOMATED)]),
            ..Default::default()
        };
        let requests = vec![request; count];
        let created = self
            .call(
                "create_available_ips",
                self.client.create_available_ips(prefix.id, &requests),
            )
            .await?;

        if created.len() != count {
            warn!(
                pool = %self.config.pool_identifier,
                requested = count,
                created = created.len(),
                "NetBox created a different number of addresses than requested"
            );
        }
        Ok(created.iter().filter_map(|r| self.to_external(r)).collect())
    }

    async fn delete_address(&self, address: &ExternalAddress) -> Result<(), IpamError> {
        if !address.is_automated() {
            return Err(IpamError::Driver(format!(
                "refusing to delete {}: not created by this system",
                address.ip
            )));
        }
        self.call(
            "delete_ip_address",
            self.client.delete_ip_address(address.external_ref.get()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use netbox_client::MockNetBoxClient;

    use super::*;

    fn config() -> NetBoxDriverConfig {
        NetBoxDriverConfig::from_raw(
            r#"{"host":"http://netbox","apiKey":"secret","networkPrefix":"10.1.1.0/24","poolIdentifier":"edge"}"#,
        )
        .unwrap()
    }

    fn driver() -> (NetBoxDriver, MockNetBoxClient) {
        let mock = MockNetBoxClient::new("http://netbox");
        mock.add_prefix("10.1.1.0/24");
        (NetBoxDriver::with_client(config(), Box::new(mock.clone())), mock)
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = config();
        assert!(!config.debug);
        assert_eq!(config.call_timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECONDS));
        assert!(!format!("{config:?}").contains("secret"));

        let bad_prefix = r#"{"host":"h","apiKey":"k","networkPrefix":"10.1.1.0","poolIdentifier":"p"}"#;
        assert!(matches!(NetBoxDriverConfig::from_raw(bad_prefix), Err(IpamError::Config(_))));

        let no_pool = r#"{"host":"h","apiKey":"k","networkPrefix":"10.1.1.0/24","poolIdentifier":""}"#;
        assert!(matches!(NetBoxDriverConfig::from_raw(no_pool), Err(IpamError::Config(_))));

        assert!(matches!(NetBoxDriverConfig::from_raw("not json"), Err(IpamError::Config(_))));
    }

    #[tokio::test]
    async fn test_lists_only_pool_addresses() {
        let (driver, mock) = driver();
        mock.add_ip_address("10.1.1.2/24", &["pool-edge", "automated"], "");
        mock.add_ip_address("10.1.1.3/24", &["pool-core"], "");
        mock.add_ip_address("10.1.1.4/24", &["pool-edge", "allocated"], "c1");

        let listed = driver.list_addresses().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|a| a.ip.to_string() == "10.1.1.2" && a.is_automated()));
        assert!(listed.iter().any(|a| a.ip.to_string() == "10.1.1.4" && a.is_leased_to("c1")));
    }

    #[tokio::test]
    async fn test_create_tags_new_addresses() {
        let (driver, mock) = driver();
        let created = driver.create_addresses(2).await.unwrap();

        assert_eq!(created.len(), 2);
        for address in &created {
            assert!(address.is_automated());
            assert!(address.tags.contains("pool-edge"));
            assert!(!address.is_allocated());
        }
        assert_eq!(driver.list_addresses().await.unwrap().len(), 2);
        assert_eq!(mock.mutation_count(), 2);
    }

    #[tokio::test]
    async fn test_create_fails_without_prefix() {
        let mock = MockNetBoxClient::new("http://netbox");
        let driver = NetBoxDriver::with_client(config(), Box::new(mock));
        let err = driver.create_addresses(1).await.unwrap_err();
        assert!(matches!(err, IpamError::Driver(_)));
    }

    #[tokio::test]
    async fn test_mark_allocated_and_released() {
        let (driver, mock) = driver();
        let record = mock.add_ip_address("10.1.1.2/24", &["pool-edge", "automated"], "");
        let address = driver.to_external(&record).unwrap();

        driver.mark_allocated(&address, "c1").await.unwrap();
        let stored = mock.ip_address(record.id).unwrap();
        assert!(stored.has_tag("allocated"));
        assert!(stored.has_tag("automated"));
        assert_eq!(stored.description, "c1");

        let leased = driver.to_external(&stored).unwrap();
        let before = mock.mutation_count();
        driver.mark_allocated(&leased, "c1").await.unwrap();
        assert_eq!(mock.mutation_count(), before);

        driver.mark_released(&leased).await.unwrap();
        let stored = mock.ip_address(record.id).unwrap();
        assert!(!stored.has_tag("allocated"));
        assert!(stored.has_tag("pool-edge"));
        assert_eq!(stored.description, "");
    }

    #[tokio::test]
    async fn test_refuses_to_delete_manual_addresses() {
        let (driver, mock) = driver();
        let manual = mock.add_ip_address("10.1.1.2/24", &["pool-edge"], "router");
        let address = driver.to_external(&manual).unwrap();

        let err = driver.delete_address(&address).await.unwrap_err();
        assert!(matches!(err, IpamError::Driver(_)));
        assert!(mock.ip_address(manual.id).is_some());

        let automated = mock.add_ip_address("10.1.1.3/24", &["pool-edge", "automated"], "");
        driver.delete_address(&driver.to_external(&automated).unwrap()).await.unwrap();
        assert!(mock.ip_address(automated.id).is_none());
    }
}
