//! NetBox lookups
//!
//! Typed helpers over the list/read operations used by the sync and
//! inventory code. The taxonomy lookups (site, platform, role, device-type)
//! fail with [`NetboxError::NotFound`] when the object is absent, since the
//! sync never creates those on its own.

use super::client::{Args, NetboxClient};
use super::error::{NetboxError, Result};
use super::records::{DeviceRecord, DeviceTypeRecord, InterfaceRecord, IpAddressRecord, ObjectRecord};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

fn params<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// First record of a filtered list call, if any
pub async fn fetch_first<T: DeserializeOwned>(
    client: &NetboxClient,
    operation_id: &str,
    params: Map<String, Value>,
) -> Result<Option<T>> {
    let res = client
        .call(operation_id, Args::new().params(params))
        .await?
        .error_for_status()?;
    let body: Value = res.json()?;

    NetboxClient::response_items(&body)?
        .into_iter()
        .next()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| NetboxError::InvalidResponse(format!("{}: {}", operation_id, e)))
        })
        .transpose()
}

/// Every record of a list call, fetched through the pager
pub async fn fetch_all<T: DeserializeOwned>(
    client: &NetboxClient,
    operation_id: &str,
    params: Map<String, Value>,
) -> Result<Vec<T>> {
    let items = client.pager(operation_id)?.all(params).await?;
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| NetboxError::InvalidResponse(format!("{}: {}", operation_id, e)))
        })
        .collect()
}

/// Detail record by id
pub async fn fetch_by_id<T: DeserializeOwned>(client: &NetboxClient, operation_id: &str, id: u64) -> Result<T> {
    client
        .call(operation_id, Args::new().id(id))
        .await?
        .error_for_status()?
        .json()
}

async fn fetch_required(
    client: &NetboxClient,
    operation_id: &str,
    kind: &'static str,
    field: &str,
    key: &str,
) -> Result<ObjectRecord> {
    fetch_first(client, operation_id, params([(field, Value::from(key))]))
        .await?
        .ok_or_else(|| NetboxError::NotFound {
            kind,
            key: key.to_string(),
        })
}

/// Site record by slug
pub async fn fetch_site(client: &NetboxClient, site_slug: &str) -> Result<ObjectRecord> {
    fetch_required(client, "dcim_sites_list", "site", "slug", site_slug).await
}

/// Platform record by slug
pub async fn fetch_platform(client: &NetboxClient, platform: &str) -> Result<ObjectRecord> {
    fetch_required(client, "dcim_platforms_list", "platform", "slug", platform).await
}

/// Device-role record by slug
pub async fn fetch_device_role(client: &NetboxClient, device_role: &str) -> Result<ObjectRecord> {
    fetch_required(client, "dcim_device_roles_list", "device-role", "slug", device_role).await
}

/// Device-type record by model name (not slug)
pub async fn fetch_device_type(client: &NetboxClient, device_type: &str) -> Result<DeviceTypeRecord> {
    fetch_first(client, "dcim_device_types_list", params([("model", Value::from(device_type))]))
        .await?
        .ok_or_else(|| NetboxError::NotFound {
            kind: "device-type",
            key: device_type.to_string(),
        })
}

/// Device-type detail; list endpoints omit the part number
pub async fn fetch_device_type_detail(client: &NetboxClient, id: u64) -> Result<DeviceTypeRecord> {
    fetch_by_id(client, "dcim_device_types_read", id).await
}

/// Site-group by slug; absence is not an error
pub async fn fetch_site_group(client: &NetboxClient, slug: &str) -> Result<Option<ObjectRecord>> {
    fetch_first(client, "dcim_site_groups_list", params([("slug", Value::from(slug))])).await
}

/// Device record by exact name
pub async fn fetch_device_by_name(client: &NetboxClient, name: &str) -> Result<Option<DeviceRecord>> {
    fetch_first(client, "dcim_devices_list", params([("name", Value::from(name))])).await
}

/// Device records for a set of names
pub async fn fetch_devices_by_name(client: &NetboxClient, names: &[String]) -> Result<Vec<DeviceRecord>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }
    fetch_all(client, "dcim_devices_list", params([("name", Value::from(names.to_vec()))])).await
}

/// All interface records of a device
pub async fn fetch_device_interfaces(client: &NetboxClient, device_id: u64) -> Result<Vec<InterfaceRecord>> {
    fetch_all(client, "dcim_interfaces_list", params([("device_id", Value::from(device_id))])).await
}

/// All IP address records of a device; empty when none are assigned
pub async fn fetch_device_ipaddrs(client: &NetboxClient, device_id: u64) -> Result<Vec<IpAddressRecord>> {
    fetch_all(client, "ipam_ip_addresses_list", params([("device_id", Value::from(device_id))])).await
}

/// One interface by device and interface name
pub async fn fetch_interface(
    client: &NetboxClient,
    device: &str,
    name: &str,
) -> Result<Option<InterfaceRecord>> {
    fetch_first(
        client,
        "dcim_interfaces_list",
        params([("device", Value::from(device)), ("name", Value::from(name))]),
    )
    .await
}

/// IP address detail by id
pub async fn fetch_ip_address(client: &NetboxClient, id: u64) -> Result<IpAddressRecord> {
    fetch_by_id(client, "ipam_ip_addresses_read", id).await
}
