//! Integration tests for NetBox client
//!
//! These tests require a running NetBox instance.
//! Set NETBOX_URL, NETBOX_TOKEN and NETBOX_TEST_PREFIX (an existing, mostly
//! empty IPv4 prefix) to run them.

use netbox_client::{IPAddressRequest, IPAddressStatus, NetBoxClient, TagRef};

fn client() -> NetBoxClient {
    let url = std::env::var("NETBOX_URL")
        .unwrap_or_else(|_| "http://localhost:8001".to_string());
    let token = std::env::var("NETBOX_TOKEN")
        .expect("NETBOX_TOKEN environment variable must be set");
    NetBoxClient::new(url, token).expect("Failed to create client")
}

#[tokio::test]
#[ignore] // Requires running NetBox instance
async fn test_validate_token() {
    client().validate_token().await.expect("Token rejected");
}

#[tokio::test]
#[ignore]
async fn test_query_ip_addresses_by_tag() {
    let ips = client()
        .query_ip_addresses(&[("tag", "automated")], true)
        .await
        .expect("Failed to query IP addresses");

    for ip in &ips {
        assert!(ip.has_tag("automated"));
    }
    println!("Found {} automated IP addresses", ips.len());
}

#[tokio::test]
#[ignore]
async fn test_create_tag_and_delete_available_ips() {
    let client = client();
    let prefix_cidr = std::env::var("NETBOX_TEST_PREFIX")
        .expect("NETBOX_TEST_PREFIX environment variable must be set");

    let prefix = client
        .query_prefixes(&[("prefix", prefix_cidr.as_str())], false)
        .await
        .expect("Failed to query prefixes")
        .into_iter()
        .next()
        .expect("Test prefix not found");

    let slug = "pod-ipam-integration";
    if client.query_tags(&[("slug", slug)], false).await.expect("query tags").is_empty() {
        client.create_tag(slug, slug, Some("integration test")).await.expect("create tag");
    }

    let request = IPAddressRequest {
        status: Some(IPAddressStatus::Active),
        tags: Some(vec![TagRef::new(slug)]),
        ..Default::default()
    };

    // Exercise both the single-object and the list form of the endpoint
    let single = client
        .create_available_ips(prefix.id, std::slice::from_ref(&request))
        .await
        .expect("Failed to create one IP");
    assert_eq!(single.len(), 1);

    let pair = client
        .create_available_ips(prefix.id, &[request.clone(), request])
        .await
        .expect("Failed to create two IPs");
    assert_eq!(pair.len(), 2);

    for ip in single.iter().chain(pair.iter()) {
        assert!(ip.has_tag(slug));
        client.delete_ip_address(ip.id).await.expect("Failed to delete IP");
    }
}
