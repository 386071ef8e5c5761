//! Builders for nested NetBox model types

use crate::models::*;

pub fn create_tag(base_url: &str, id: u64, name: &str, slug: &str) -> Tag {
    Tag {
        id,
        url: format!("{}/api/extras/tags/{}/", base_url, id),
        display: name.to_string(),
        name: name.to_string(),
        slug: slug.to_string(),
        color: "9e9e9e".to_string(),
        description: String::new(),
    }
}

pub fn nest_tag(tag: &Tag) -> NestedTag {
    NestedTag {
        id: tag.id,
        url: tag.url.clone(),
        display: tag.display.clone(),
        name: tag.name.clone(),
        slug: tag.slug.clone(),
    }
}

/// Host part of a CIDR-style address ("10.1.1.2/24" -> "10.1.1.2")
pub fn host_of(address: &str) -> &str {
    address.split('/').next().unwrap_or(address)
}
