//! NetBox API client
//!
//! Implements the NetBox REST API client for IPAM operations.
//! Based on NetBox API structure: /api/ipam/prefixes/, /api/ipam/ip-addresses/
//! and /api/extras/tags/

use crate::common::query::query_resources;
use crate::common::HttpClient;
use crate::error::NetBoxError;
use crate::models::*;
use crate::netbox_trait::NetBoxClientTrait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// NetBox API client
pub struct NetBoxClient {
    http: HttpClient,
}

impl NetBoxClient {
    /// Create a new NetBox client
    ///
    /// # Arguments
    /// * `base_url` - NetBox base URL (e.g., "http://netbox:80")
    /// * `token` - API token for authentication
    pub fn new(base_url: String, token: String) -> Result<Self, NetBoxError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http: HttpClient::new(client, base_url, token),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Validate the API token by requesting the (authenticated) status endpoint.
    pub async fn validate_token(&self) -> Result<(), NetBoxError> {
        debug!("Validating NetBox token and connectivity");
        let _: serde_json::Value = self.http.get("/api/status/").await?;
        debug!("Token validated successfully");
        Ok(())
    }

    // ====================
    // Prefix API Methods
    // ====================

    /// Get a prefix by ID
    pub async fn get_prefix(&self, id: u64) -> Result<Prefix, NetBoxError> {
        debug!("Fetching prefix {} from NetBox", id);
        self.http.get(&format!("/api/ipam/prefixes/{}/", id)).await
    }

    /// Query prefixes by filters (e.g. `[("prefix", "10.1.1.0/24")]`)
    pub async fn query_prefixes(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Prefix>, NetBoxError> {
        debug!("Querying prefixes with filters: {:?}", filters);
        query_resources(&self.http, "ipam/prefixes", filters, fetch_all).await
    }

    /// List free addresses of a prefix without reserving them
    pub async fn get_available_ips(&self, prefix_id: u64, limit: Option<u32>) -> Result<Vec<AvailableIP>, NetBoxError> {
        let mut path = format!("/api/ipam/prefixes/{}/available-ips/", prefix_id);
        if let Some(limit) = limit {
            path = format!("{}?limit={}", path, limit);
        }
        debug!("Fetching available IPs from prefix {}", prefix_id);
        self.http.get(&path).await
    }

    /// Create one IP address per request from the free space of a prefix.
    ///
    /// NetBox picks the addresses. A single request is posted as a bare object
    /// and answered with one object, several are posted as a list and answered
    /// with a list; both shapes are accepted here. NetBox answers 409 when the
    /// prefix cannot satisfy the whole batch.
    pub async fn create_available_ips(&self, prefix_id: u64, requests: &[IPAddressRequest]) -> Result<Vec<IPAddress>, NetBoxError> {
        let body = match requests {
            [] => return Ok(Vec::new()),
            [single] => serde_json::to_value(single)?,
            many => serde_json::to_value(many)?,
        };

        debug!("Creating {} IP address(es) in prefix {}", requests.len(), prefix_id);
        let created: OneOrMany<IPAddress> = self
            .http
            .post(&format!("/api/ipam/prefixes/{}/available-ips/", prefix_id), &body)
            .await?;
        Ok(created.into_vec())
    }

    // ====================
    // IP Address API Methods
    // ====================

    /// Get an IP address by ID
    pub async fn get_ip_address(&self, id: u64) -> Result<IPAddress, NetBoxError> {
        debug!("Fetching IP address {} from NetBox", id);
        self.http.get(&format!("/api/ipam/ip-addresses/{}/", id)).await
    }

    /// Query IP addresses by filters. Repeated `tag` filters are ANDed by NetBox.
    pub async fn query_ip_addresses(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<IPAddress>, NetBoxError> {
        debug!("Querying IP addresses with filters: {:?}", filters);
        query_resources(&self.http, "ipam/ip-addresses", filters, fetch_all).await
    }

    /// Create an IP address with an explicit `address` (e.g. "10.1.1.2/24")
    pub async fn create_ip_address(&self, address: &str, request: Option<IPAddressRequest>) -> Result<IPAddress, NetBoxError> {
        let request = IPAddressRequest {
            address: Some(address.to_string()),
            ..request.unwrap_or_default()
        };
        debug!("Creating IP address {} in NetBox", address);
        self.http
            .post("/api/ipam/ip-addresses/", &serde_json::to_value(&request)?)
            .await
    }

    /// Partially update an IP address. Unset request fields are left untouched.
    pub async fn update_ip_address(&self, id: u64, request: IPAddressRequest) -> Result<IPAddress, NetBoxError> {
        debug!("Updating IP address {} in NetBox", id);
        self.http
            .patch(&format!("/api/ipam/ip-addresses/{}/", id), &serde_json::to_value(&request)?)
            .await
    }

    /// Delete an IP address
    pub async fn delete_ip_address(&self, id: u64) -> Result<(), NetBoxError> {
        debug!("Deleting IP address {} from NetBox", id);
        self.http.delete(&format!("/api/ipam/ip-addresses/{}/", id)).await
    }

    // ====================
    // Tag API Methods
    // ====================

    /// Query tags by filters
    pub async fn query_tags(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Tag>, NetBoxError> {
        debug!("Querying tags with filters: {:?}", filters);
        query_resources(&self.http, "extras/tags", filters, fetch_all).await
    }

    /// Create a new tag
    pub async fn create_tag(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Tag, NetBoxError> {
        debug!("Creating tag {} in NetBox", slug);
        let mut body = serde_json::json!({
            "name": name,
            "slug": slug,
        });
        if let Some(desc) = description {
            body["description"] = serde_json::Value::String(desc.to_string());
        }
        self.http.post("/api/extras/tags/", &body).await
    }
}

#[async_trait::async_trait]
impl NetBoxClientTrait for NetBoxClient {
    fn base_url(&self) -> &str {
        self.base_url()
    }

    async fn validate_token(&self) -> Result<(), NetBoxError> {
        self.validate_token().await
    }

    async fn get_prefix(&self, id: u64) -> Result<Prefix, NetBoxError> {
        self.get_prefix(id).await
    }

    async fn query_prefixes(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Prefix>, NetBoxError> {
        self.query_prefixes(filters, fetch_all).await
    }

    async fn get_available_ips(&self, prefix_id: u64, limit: Option<u32>) -> Result<Vec<AvailableIP>, NetBoxError> {
        self.get_available_ips(prefix_id, limit).await
    }

    async fn create_available_ips(&self, prefix_id: u64, requests: &[IPAddressRequest]) -> Result<Vec<IPAddress>, NetBoxError> {
        self.create_available_ips(prefix_id, requests).await
    }

    async fn get_ip_address(&self, id: u64) -> Result<IPAddress, NetBoxError> {
        self.get_ip_address(id).await
    }

    async fn query_ip_addresses(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<IPAddress>, NetBoxError> {
        self.query_ip_addresses(filters, fetch_all).await
    }

    async fn create_ip_address(&self, address: &str, request: Option<IPAddressRequest>) -> Result<IPAddress, NetBoxError> {
        self.create_ip_address(address, request).await
    }

    async fn update_ip_address(&self, id: u64, request: IPAddressRequest) -> Result<IPAddress, NetBoxError> {
        self.update_ip_address(id, request).await
    }

    async fn delete_ip_address(&self, id: u64) -> Result<(), NetBoxError> {
        self.delete_ip_address(id).await
    }

    async fn query_tags(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Tag>, NetBoxError> {
        self.query_tags(filters, fetch_all).await
    }

    async fn create_tag(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Tag, NetBoxError> {
        self.create_tag(name, slug, description).await
    }
}
