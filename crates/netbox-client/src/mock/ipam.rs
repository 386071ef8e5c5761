//! IPAM operations for MockNetBoxClient
//!
//! Handles prefixes and IP addresses

use super::extras::resolve_tags;
use super::helpers::host_of;
use super::MockNetBoxClient;
use crate::error::NetBoxError;
use crate::models::*;
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

pub async fn get_prefix(client: &MockNetBoxClient, id: u64) -> Result<Prefix, NetBoxError> {
    client.prefixes
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .ok_or_else(|| NetBoxError::NotFound(format!("Prefix {} not found", id)))
}

pub async fn query_prefixes(client: &MockNetBoxClient, filters: &[(&str, &str)], _fetch_all: bool) -> Result<Vec<Prefix>, NetBoxError> {
    let prefixes = client.prefixes.lock().unwrap();
    let mut matching: Vec<Prefix> = prefixes
        .values()
        .filter(|p| filters.iter().all(|(key, value)| *key != "prefix" || p.prefix == *value))
        .cloned()
        .collect();
    matching.sort_by_key(|p| p.id);
    Ok(matching)
}

/// Free host addresses of a prefix, lowest first
fn free_hosts(client: &MockNetBoxClient, prefix: &Prefix) -> Result<Vec<Ipv4Addr>, NetBoxError> {
    let net: Ipv4Net = prefix
        .prefix
        .parse()
        .map_err(|e| NetBoxError::InvalidRequest(format!("Prefix {} is not IPv4: {}", prefix.prefix, e)))?;

    let used: HashSet<Ipv4Addr> = client
        .ip_addresses
        .lock()
        .unwrap()
        .values()
        .filter_map(|ip| host_of(&ip.address).parse().ok())
        .collect();

    Ok(net.hosts().filter(|host| !used.contains(host)).collect())
}

pub async fn get_available_ips(client: &MockNetBoxClient, prefix_id: u64, limit: Option<u32>) -> Result<Vec<AvailableIP>, NetBoxError> {
    let prefix = get_prefix(client, prefix_id).await?;
    let net: Ipv4Net = prefix.prefix.parse().map_err(|e| NetBoxError::InvalidRequest(format!("{}", e)))?;
    let limit = limit.map_or(usize::MAX, |l| l as usize);

    Ok(free_hosts(client, &prefix)?
        .into_iter()
        .take(limit)
        .map(|host| AvailableIP {
            family: 4,
            address: format!("{}/{}", host, net.prefix_len()),
            vrf: None,
            description: None,
        })
        .collect())
}

pub async fn create_available_ips(client: &MockNetBoxClient, prefix_id: u64, requests: &[IPAddressRequest]) -> Result<Vec<IPAddress>, NetBoxError> {
    let prefix = get_prefix(client, prefix_id).await?;
    let net: Ipv4Net = prefix.prefix.parse().map_err(|e| NetBoxError::InvalidRequest(format!("{}", e)))?;
    let free = free_hosts(client, &prefix)?;

    if free.len() < requests.len() {
        return Err(NetBoxError::Api {
            status: 409,
            message: format!(
                "POST /api/ipam/prefixes/{}/available-ips/: Insufficient space is available to accommodate the requested number of IPs ({})",
                prefix_id,
                requests.len()
            ),
        });
    }

    let mut created = Vec::with_capacity(requests.len());
    for (host, request) in free.into_iter().zip(requests) {
        let address = format!("{}/{}", host, net.prefix_len());
        created.push(create_ip_address(client, &address, Some(request.clone())).await?);
    }
    Ok(created)
}

pub async fn get_ip_address(client: &MockNetBoxClient, id: u64) -> Result<IPAddress, NetBoxError> {
    client.ip_address(id)
        .ok_or_else(|| NetBoxError::NotFound(format!("IP address {} not found", id)))
}

pub async fn query_ip_addresses(client: &MockNetBoxClient, filters: &[(&str, &str)], _fetch_all: bool) -> Result<Vec<IPAddress>, NetBoxError> {
    let mut parents = Vec::new();
    for (key, value) in filters {
        if *key == "parent" {
            let net: Ipv4Net = value.parse().map_err(|e| NetBoxError::InvalidRequest(format!("parent={}: {}", value, e)))?;
            parents.push(net);
        }
    }

    Ok(client
        .ip_addresses()
        .into_iter()
        .filter(|ip| {
            filters.iter().all(|(key, value)| match *key {
                "tag" => ip.has_tag(value),
                "address" => host_of(&ip.address) == host_of(value),
                "description" => ip.description == *value,
                _ => true,
            })
        })
        .filter(|ip| {
            parents.iter().all(|net| {
                host_of(&ip.address)
                    .parse::<Ipv4Addr>()
                    .is_ok_and(|host| net.contains(&host))
            })
        })
        .collect())
}

pub async fn create_ip_address(client: &MockNetBoxClient, address: &str, request: Option<IPAddressRequest>) -> Result<IPAddress, NetBoxError> {
    let request = request.unwrap_or_default();
    let tags = resolve_tags(client, request.tags.as_deref().unwrap_or_default())?;
    let mut ip = client.build_ip_address(address, request.description.unwrap_or_default(), tags);
    if let Some(status) = request.status {
        ip.status = Some(Choice::Bare(status));
    }
    if let Some(dns_name) = request.dns_name {
        ip.dns_name = dns_name;
    }

    client.ip_addresses.lock().unwrap().insert(ip.id, ip.clone());
    client.record_mutation();
    Ok(ip)
}

pub async fn update_ip_address(client: &MockNetBoxClient, id: u64, request: IPAddressRequest) -> Result<IPAddress, NetBoxError> {
    let tags = match &request.tags {
        Some(refs) => Some(resolve_tags(client, refs)?),
        None => None,
    };

    let mut ip_addresses = client.ip_addresses.lock().unwrap();
    let ip = ip_addresses
        .get_mut(&id)
        .ok_or_else(|| NetBoxError::NotFound(format!("IP address {} not found", id)))?;

    if let Some(address) = request.address {
        ip.display = address.clone();
        ip.address = address;
    }
    if let Some(description) = request.description {
        ip.description = description;
    }
    if let Some(status) = request.status {
        ip.status = Some(Choice::Bare(status));
    }
    if let Some(dns_name) = request.dns_name {
        ip.dns_name = dns_name;
    }
    if let Some(tags) = tags {
        ip.tags = tags;
    }
    ip.last_updated = Some(chrono::Utc::now().to_rfc3339());

    let updated = ip.clone();
    drop(ip_addresses);
    client.record_mutation();
    Ok(updated)
}

pub async fn delete_ip_address(client: &MockNetBoxClient, id: u64) -> Result<(), NetBoxError> {
    client.ip_addresses
        .lock()
        .unwrap()
        .remove(&id)
        .ok_or_else(|| NetBoxError::NotFound(format!("IP address {} not found", id)))?;
    client.record_mutation();
    Ok(())
}
