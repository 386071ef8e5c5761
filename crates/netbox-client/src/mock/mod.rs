//! Mock NetBoxClient for unit testing
//!
//! An in-memory NetBox good enough to drive the pool sync loop: prefixes hand
//! out free host addresses, `tag` filters are honoured, and every IP address
//! mutation is counted so tests can assert idempotency.
//!
//! - `ipam.rs` - prefixes and IP addresses
//! - `extras.rs` - tags
//! - `helpers.rs` - builders for nested types

mod extras;
mod helpers;
mod ipam;

use crate::error::NetBoxError;
use crate::models::*;
use crate::netbox_trait::NetBoxClientTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock NetBoxClient for testing
#[derive(Clone)]
pub struct MockNetBoxClient {
    pub(crate) base_url: String,
    pub(crate) prefixes: Arc<Mutex<HashMap<u64, Prefix>>>,
    pub(crate) ip_addresses: Arc<Mutex<HashMap<u64, IPAddress>>>,
    pub(crate) tags: Arc<Mutex<HashMap<u64, Tag>>>,
    pub(crate) next_id: Arc<Mutex<u64>>,
    pub(crate) mutations: Arc<Mutex<u64>>,
}

impl MockNetBoxClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            prefixes: Arc::new(Mutex::new(HashMap::new())),
            ip_addresses: Arc::new(Mutex::new(HashMap::new())),
            tags: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            mutations: Arc::new(Mutex::new(0)),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }

    pub(crate) fn record_mutation(&self) {
        *self.mutations.lock().unwrap() += 1;
    }

    /// Register a prefix (e.g. "10.1.1.0/24")
    pub fn add_prefix(&self, prefix: &str) -> Prefix {
        let id = self.next_id();
        let prefix = Prefix {
            id,
            url: format!("{}/api/ipam/prefixes/{}/", self.base_url, id),
            display: prefix.to_string(),
            family: Some(Choice::Labeled { value: 4, label: "IPv4".to_string() }),
            prefix: prefix.to_string(),
            vrf: None,
            status: Some(Choice::Labeled { value: PrefixStatus::Active, label: "Active".to_string() }),
            is_pool: false,
            description: String::new(),
            tags: Vec::new(),
        };
        self.prefixes.lock().unwrap().insert(id, prefix.clone());
        prefix
    }

    /// Register an IP address (e.g. "10.1.1.2/24"), creating missing tags.
    /// Not counted as a mutation.
    pub fn add_ip_address(&self, address: &str, tag_slugs: &[&str], description: &str) -> IPAddress {
        let tags = tag_slugs.iter().map(|slug| self.ensure_tag(slug)).collect();
        let ip = self.build_ip_address(address, description.to_string(), tags);
        self.ip_addresses.lock().unwrap().insert(ip.id, ip.clone());
        ip
    }

    /// Current state of one IP address
    pub fn ip_address(&self, id: u64) -> Option<IPAddress> {
        self.ip_addresses.lock().unwrap().get(&id).cloned()
    }

    /// All IP addresses, ordered by id
    pub fn ip_addresses(&self) -> Vec<IPAddress> {
        let mut all: Vec<IPAddress> = self.ip_addresses.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|ip| ip.id);
        all
    }

    /// Number of IP address creates, updates and deletes served so far
    pub fn mutation_count(&self) -> u64 {
        *self.mutations.lock().unwrap()
    }

    fn ensure_tag(&self, slug: &str) -> NestedTag {
        let existing = self.tags.lock().unwrap().values().find(|t| t.slug == slug).cloned();
        let tag = match existing {
            Some(tag) => tag,
            None => {
                let id = self.next_id();
                let tag = helpers::create_tag(&self.base_url, id, slug, slug);
                self.tags.lock().unwrap().insert(id, tag.clone());
                tag
            }
        };
        helpers::nest_tag(&tag)
    }

    pub(crate) fn build_ip_address(&self, address: &str, description: String, tags: Vec<NestedTag>) -> IPAddress {
        let id = self.next_id();
        let now = chrono::Utc::now().to_rfc3339();
        IPAddress {
            id,
            url: format!("{}/api/ipam/ip-addresses/{}/", self.base_url, id),
            display: address.to_string(),
            family: Some(Choice::Labeled { value: 4, label: "IPv4".to_string() }),
            address: address.to_string(),
            vrf: None,
            status: Some(Choice::Labeled { value: IPAddressStatus::Active, label: "Active".to_string() }),
            dns_name: String::new(),
            description,
            comments: String::new(),
            tags,
            custom_fields: serde_json::json!({}),
            created: Some(now.clone()),
            last_updated: Some(now),
        }
    }
}

#[async_trait::async_trait]
impl NetBoxClientTrait for MockNetBoxClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn validate_token(&self) -> Result<(), NetBoxError> {
        Ok(())
    }

    async fn get_prefix(&self, id: u64) -> Result<Prefix, NetBoxError> {
        ipam::get_prefix(self, id).await
    }

    async fn query_prefixes(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Prefix>, NetBoxError> {
        ipam::query_prefixes(self, filters, fetch_all).await
    }

    async fn get_available_ips(&self, prefix_id: u64, limit: Option<u32>) -> Result<Vec<AvailableIP>, NetBoxError> {
        ipam::get_available_ips(self, prefix_id, limit).await
    }

    async fn create_available_ips(&self, prefix_id: u64, requests: &[IPAddressRequest]) -> Result<Vec<IPAddress>, NetBoxError> {
        ipam::create_available_ips(self, prefix_id, requests).await
    }

    async fn get_ip_address(&self, id: u64) -> Result<IPAddress, NetBoxError> {
        ipam::get_ip_address(self, id).await
    }

    async fn query_ip_addresses(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<IPAddress>, NetBoxError> {
        ipam::query_ip_addresses(self, filters, fetch_all).await
    }

    async fn create_ip_address(&self, address: &str, request: Option<IPAddressRequest>) -> Result<IPAddress, NetBoxError> {
        ipam::create_ip_address(self, address, request).await
    }

    async fn update_ip_address(&self, id: u64, request: IPAddressRequest) -> Result<IPAddress, NetBoxError> {
        ipam::update_ip_address(self, id, request).await
    }

    async fn delete_ip_address(&self, id: u64) -> Result<(), NetBoxError> {
        ipam::delete_ip_address(self, id).await
    }

    async fn query_tags(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Tag>, NetBoxError> {
        extras::query_tags(self, filters, fetch_all).await
    }

    async fn create_tag(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Tag, NetBoxError> {
        extras::create_tag(self, name, slug, description).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_available_ips_skips_used_hosts() {
        let mock = MockNetBoxClient::new("http://netbox");
        let prefix = mock.add_prefix("10.1.1.0/29");
        mock.add_ip_address("10.1.1.1/29", &[], "gateway");

        let created = mock
            .create_available_ips(prefix.id, &[IPAddressRequest::default(), IPAddressRequest::default()])
            .await
            .unwrap();
        let hosts: Vec<&str> = created.iter().map(IPAddress::host).collect();
        assert_eq!(hosts, vec!["10.1.1.2", "10.1.1.3"]);
        assert_eq!(created[0].address, "10.1.1.2/29");
        assert_eq!(mock.mutation_count(), 2);

        let free = mock.get_available_ips(prefix.id, None).await.unwrap();
        assert_eq!(free.len(), 3); // .4 .5 .6
    }

    #[tokio::test]
    async fn test_create_available_ips_rejects_oversized_batch() {
        let mock = MockNetBoxClient::new("http://netbox");
        let prefix = mock.add_prefix("10.1.1.0/30");
        let requests = vec![IPAddressRequest::default(); 3];
        let err = mock.create_available_ips(prefix.id, &requests).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(mock.ip_addresses().is_empty());
    }

    #[tokio::test]
    async fn test_query_ip_addresses_filters_by_every_tag() {
        let mock = MockNetBoxClient::new("http://netbox");
        mock.add_ip_address("10.1.1.2/24", &["pool-a", "allocated"], "c1");
        mock.add_ip_address("10.1.1.3/24", &["pool-a"], "");
        mock.add_ip_address("10.1.1.4/24", &["pool-b"], "");

        let pool_a = mock.query_ip_addresses(&[("tag", "pool-a")], true).await.unwrap();
        assert_eq!(pool_a.len(), 2);

        let leased = mock
            .query_ip_addresses(&[("tag", "pool-a"), ("tag", "allocated")], true)
            .await
            .unwrap();
        assert_eq!(leased.len(), 1);
        assert_eq!(leased[0].description, "c1");
    }

    #[tokio::test]
    async fn test_update_requires_existing_tags() {
        let mock = MockNetBoxClient::new("http://netbox");
        let ip = mock.add_ip_address("10.1.1.2/24", &["pool-a"], "");

        let err = mock
            .update_ip_address(ip.id, IPAddressRequest {
                tags: Some(vec![TagRef::new("missing")]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, NetBoxError::InvalidRequest(_)));

        mock.create_tag("allocated", "allocated", None).await.unwrap();
        let updated = mock
            .update_ip_address(ip.id, IPAddressRequest {
                description: Some("c1".to_string()),
                tags: Some(vec![TagRef::new("pool-a"), TagRef::new("allocated")]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(updated.has_tag("allocated"));
        assert_eq!(mock.ip_address(ip.id).unwrap().description, "c1");
    }
}
