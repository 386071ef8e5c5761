//! Tag operations for MockNetBoxClient

use super::helpers;
use super::MockNetBoxClient;
use crate::error::NetBoxError;
use crate::models::*;

pub async fn query_tags(client: &MockNetBoxClient, filters: &[(&str, &str)], _fetch_all: bool) -> Result<Vec<Tag>, NetBoxError> {
    let tags = client.tags.lock().unwrap();
    Ok(tags
        .values()
        .filter(|tag| {
            filters.iter().all(|(key, value)| match *key {
                "slug" => tag.slug == *value,
                "name" => tag.name == *value,
                _ => true,
            })
        })
        .cloned()
        .collect())
}

pub async fn create_tag(client: &MockNetBoxClient, name: &str, slug: &str, description: Option<&str>) -> Result<Tag, NetBoxError> {
    if client.tags.lock().unwrap().values().any(|t| t.slug == slug) {
        return Err(NetBoxError::InvalidRequest(format!(
            "POST /api/extras/tags/: tag with this slug already exists: {}",
            slug
        )));
    }

    let id = client.next_id();
    let mut tag = helpers::create_tag(&client.base_url, id, name, slug);
    tag.description = description.unwrap_or_default().to_string();
    client.tags.lock().unwrap().insert(id, tag.clone());
    Ok(tag)
}

/// Resolve tag references the way NetBox does: every slug must exist.
pub(crate) fn resolve_tags(client: &MockNetBoxClient, refs: &[TagRef]) -> Result<Vec<NestedTag>, NetBoxError> {
    let tags = client.tags.lock().unwrap();
    refs.iter()
        .map(|r| {
            tags.values()
                .find(|t| t.slug == r.slug)
                .map(helpers::nest_tag)
                .ok_or_else(|| NetBoxError::InvalidRequest(format!("Related object not found using the provided attributes: {{'slug': '{}'}}", r.slug)))
        })
        .collect()
}
