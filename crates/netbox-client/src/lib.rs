//! NetBox REST API Client
//!
//! A Rust client for the parts of the NetBox REST API that back pod IP pools:
//! prefixes, IP addresses and tags.
//!
//! # Example
//!
//! ```no_run
//! use netbox_client::{IPAddressRequest, IPAddressStatus, NetBoxClient, TagRef};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = NetBoxClient::new(
//!     "http://netbox:80".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! // Find the prefix backing a pool
//! let prefixes = client.query_prefixes(&[("prefix", "10.1.1.0/24")], false).await?;
//!
//! // Carve two fresh addresses out of it, tagged for the pool
//! let request = IPAddressRequest {
//!     status: Some(IPAddressStatus::Active),
//!     tags: Some(vec![TagRef::new("pool-a"), TagRef::new("automated")]),
//!     ..Default::default()
//! };
//! let created = client
//!     .create_available_ips(prefixes[0].id, &[request.clone(), request])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod netbox_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::NetBoxClient;
pub use common::{HttpClient, PaginatedResponse};
pub use error::NetBoxError;
pub use models::*;
pub use netbox_trait::NetBoxClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockNetBoxClient;
