//! NetBox API models
//!
//! These models match the NetBox REST API serializers for the IPAM and extras
//! endpoints. Only fields the pool driver reads are required; everything else is
//! defaulted so newer NetBox releases keep deserializing.

use serde::{Deserialize, Serialize};

/// NetBox API response wrapper (for paginated responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Choice field. NetBox renders `{"value": ..., "label": ...}` on read but
/// accepts the bare value on write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Choice<T> {
    Labeled { value: T, label: String },
    Bare(T),
}

impl<T> Choice<T> {
    /// The underlying value, whichever form NetBox used
    pub fn value(&self) -> &T {
        match self {
            Choice::Labeled { value, .. } | Choice::Bare(value) => value,
        }
    }
}

/// Body of a bulk-capable endpoint: one object for a single-object request,
/// a list otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Prefix model matching NetBox PrefixSerializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prefix {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub family: Option<Choice<u8>>,
    pub prefix: String, // e.g., "10.1.1.0/24"
    #[serde(default)]
    pub vrf: Option<NestedVrf>,
    #[serde(default)]
    pub status: Option<Choice<PrefixStatus>>,
    #[serde(default)]
    pub is_pool: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<NestedTag>,
}

/// IP Address model matching NetBox IPAddressSerializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IPAddress {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display: String,
    #[serde(default)]
    pub family: Option<Choice<u8>>,
    pub address: String, // e.g., "10.1.1.2/24"
    #[serde(default)]
    pub vrf: Option<NestedVrf>,
    #[serde(default)]
    pub status: Option<Choice<IPAddressStatus>>,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub tags: Vec<NestedTag>,
    #[serde(default)]
    pub custom_fields: serde_json::Value,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl IPAddress {
    /// Slugs of every tag on this address
    pub fn tag_slugs(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.slug.as_str())
    }

    pub fn has_tag(&self, slug: &str) -> bool {
        self.tag_slugs().any(|s| s == slug)
    }

    /// Host part of `address`, without the prefix length
    pub fn host(&self) -> &str {
        self.address.split('/').next().unwrap_or(&self.address)
    }
}

/// Available IP Address (from prefix available-ips endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableIP {
    pub family: u8,
    pub address: String, // e.g., "10.1.1.3/24"
    #[serde(default)]
    pub vrf: Option<NestedVrf>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Writable IP address fields, used for create and partial update.
///
/// `tags` replaces the full tag set when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IPAddressRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IPAddressStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagRef>>,
}

/// Reference to an existing tag by slug
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRef {
    pub slug: String,
}

impl TagRef {
    pub fn new(slug: impl Into<String>) -> Self {
        Self { slug: slug.into() }
    }
}

/// Tag model matching NetBox TagSerializer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
}

// Nested serializers (simplified versions for references)

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedVrf {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedTag {
    pub id: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub display: String,
    pub name: String,
    pub slug: String,
}

/// Prefix status choices
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixStatus {
    Container,
    Active,
    Reserved,
    Deprecated,
}

/// IP Address status choices
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum IPAddressStatus {
    Active,
    Reserved,
    Deprecated,
    Dhcp,
    Slaac,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_address_reads_labeled_choices() {
        let ip: IPAddress = serde_json::from_value(serde_json::json!({
            "id": 7,
            "family": {"value": 4, "label": "IPv4"},
            "address": "10.1.1.2/24",
            "status": {"value": "active", "label": "Active"},
            "description": "",
            "tags": [{"id": 1, "name": "pool-a", "slug": "pool-a"}],
            "assigned_object": null
        }))
        .unwrap();

        assert_eq!(ip.family.as_ref().map(Choice::value), Some(&4));
        assert_eq!(ip.status.as_ref().map(Choice::value), Some(&IPAddressStatus::Active));
        assert_eq!(ip.host(), "10.1.1.2");
        assert!(ip.has_tag("pool-a"));
        assert!(!ip.has_tag("allocated"));
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let request = IPAddressRequest {
            description: Some(String::new()),
            tags: Some(vec![TagRef::new("pool-a")]),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"description": "", "tags": [{"slug": "pool-a"}]})
        );
    }

    #[test]
    fn test_one_or_many() {
        let one: OneOrMany<u64> = serde_json::from_str("3").unwrap();
        assert_eq!(one.into_vec(), vec![3]);
        let many: OneOrMany<u64> = serde_json::from_str("[1,2]").unwrap();
        assert_eq!(many.into_vec(), vec![1, 2]);
    }
}
