//! NetBoxClient trait for mocking
//!
//! The concrete NetBoxClient implements this trait; the pool driver only ever
//! holds a `Box<dyn NetBoxClientTrait>` so tests can swap in the mock.

use crate::error::NetBoxError;
use crate::models::*;

/// Trait for NetBox API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait NetBoxClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// Validate the API token
    async fn validate_token(&self) -> Result<(), NetBoxError>;

    // Prefixes
    async fn get_prefix(&self, id: u64) -> Result<Prefix, NetBoxError>;
    async fn query_prefixes(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Prefix>, NetBoxError>;
    async fn get_available_ips(&self, prefix_id: u64, limit: Option<u32>) -> Result<Vec<AvailableIP>, NetBoxError>;
    async fn create_available_ips(&self, prefix_id: u64, requests: &[IPAddressRequest]) -> Result<Vec<IPAddress>, NetBoxError>;

    // IP addresses
    async fn get_ip_address(&self, id: u64) -> Result<IPAddress, NetBoxError>;
    async fn query_ip_addresses(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<IPAddress>, NetBoxError>;
    async fn create_ip_address(&self, address: &str, request: Option<IPAddressRequest>) -> Result<IPAddress, NetBoxError>;
    async fn update_ip_address(&self, id: u64, request: IPAddressRequest) -> Result<IPAddress, NetBoxError>;
    async fn delete_ip_address(&self, id: u64) -> Result<(), NetBoxError>;

    // Tags
    async fn query_tags(&self, filters: &[(&str, &str)], fetch_all: bool) -> Result<Vec<Tag>, NetBoxError>;
    async fn create_tag(&self, name: &str, slug: &str, description: Option<&str>) -> Result<Tag, NetBoxError>;
}
