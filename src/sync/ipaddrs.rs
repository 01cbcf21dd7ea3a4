//! IP address assignment reconciliation
//!
//! Addresses are keyed by `(interface-name, address)`. Missing assignments are
//! created; surplus ones are deleted only for exclusively managed devices.

use super::interfaces::InterfaceMap;
use super::SyncOptions;
use crate::design::Device;
use crate::netbox::records::{DeviceRecord, IpAddressRecord};
use crate::netbox::{fetch, Args, NetboxClient, Result};
use futures::future::join_all;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

pub type IpKey = (String, String);

/// NetBox IP address records of one device
pub type IpAddrMap = BTreeMap<IpKey, IpAddressRecord>;

pub fn expected_ipaddrs(dev: &Device) -> BTreeSet<IpKey> {
    dev.used_interfaces()
        .filter_map(|iface| Some((iface.name.clone(), iface.address()?.to_string())))
        .collect()
}

pub fn observed_ipaddrs(records: Vec<IpAddressRecord>) -> IpAddrMap {
    records
        .into_iter()
        .filter_map(|rec| {
            let if_name = rec.interface_name()?.to_string();
            Some(((if_name, rec.address.clone()), rec))
        })
        .collect()
}

pub async fn sync_ipaddrs(
    client: &NetboxClient,
    dev: &Device,
    dev_rec: &DeviceRecord,
    if_map: &InterfaceMap,
    options: &SyncOptions,
) -> Result<IpAddrMap> {
    let mut ip_map = observed_ipaddrs(fetch::fetch_device_ipaddrs(client, dev_rec.id).await?);
    let expected = expected_ipaddrs(dev);

    let surplus: Vec<IpKey> = ip_map.keys().filter(|k| !expected.contains(*k)).cloned().collect();
    if !surplus.is_empty() {
        if dev.exclusive && options.prune_ip_addresses {
            let removed = join_all(surplus.iter().filter_map(|key| {
                let rec = ip_map.get(key)?;
                Some(delete_ipaddr(client, dev, key, rec.id))
            }))
            .await;
            for key in removed.into_iter().flatten() {
                ip_map.remove(&key);
            }
        } else {
            tracing::info!(
                "{}: {} IP addresses not in design, device not exclusive, leaving as-is",
                dev.name,
                surplus.len()
            );
        }
    }

    let missing: Vec<&IpKey> = expected.iter().filter(|k| !ip_map.contains_key(*k)).collect();
    let created = join_all(missing.into_iter().map(|key| create_ipaddr(client, dev, key, if_map))).await;
    ip_map.extend(created.into_iter().flatten());

    Ok(ip_map)
}

async fn create_ipaddr(
    client: &NetboxClient,
    dev: &Device,
    key: &IpKey,
    if_map: &InterfaceMap,
) -> Option<(IpKey, IpAddressRecord)> {
    let (if_name, address) = key;
    let Some(if_rec) = if_map.get(if_name) else {
        tracing::error!("{}:{} missing in NetBox, cannot assign IP address {}", dev.name, if_name, address);
        return None;
    };

    let body = json!({
        "address": address,
        "assigned_object_type": "dcim.interface",
        "assigned_object_id": if_rec.id,
    });

    let res = match client.call("ipam_ip_addresses_create", Args::new().json(body)).await {
        Ok(res) => res,
        Err(e) => {
            tracing::error!("{}:{} IP address {} failed to create: {}", dev.name, if_name, address, e);
            return None;
        }
    };
    if res.is_error() {
        tracing::error!("{}:{} IP address {} failed to create: {}", dev.name, if_name, address, res.log_text());
        return None;
    }

    tracing::info!("{}:{} IP address {} created and assigned OK", dev.name, if_name, address);
    match res.json::<IpAddressRecord>() {
        Ok(rec) => Some((key.clone(), rec)),
        Err(e) => {
            tracing::error!("{}:{} IP address {}: {}", dev.name, if_name, address, e);
            None
        }
    }
}

async fn delete_ipaddr(client: &NetboxClient, dev: &Device, key: &IpKey, id: u64) -> Option<IpKey> {
    let (if_name, address) = key;
    match client.call("ipam_ip_addresses_delete", Args::new().id(id)).await {
        Ok(res) if !res.is_error() => {
            tracing::info!("{}:{}: IP address {} removed OK", dev.name, if_name, address);
            Some(key.clone())
        }
        Ok(res) => {
            tracing::error!("{}:{}: IP address {} failed to remove: {}", dev.name, if_name, address, res.log_text());
            None
        }
        Err(e) => {
            tracing::error!("{}:{}: IP address {} failed to remove: {}", dev.name, if_name, address, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::model::{DeviceClass, InterfaceKind, InterfaceProfile};
    use std::sync::Arc;

    #[test]
    fn test_expected_only_used_interfaces_with_address() {
        let class = Arc::new(DeviceClass {
            platform: None,
            device_type: "CSR1000V".into(),
        });
        let mut dev = Device::new("r1", class);
        dev.interface_mut("Gi1").profile = Some(InterfaceProfile::layer3("mgmt", "10.0.0.1/24"));
        dev.interface_mut("Gi2").profile = Some(InterfaceProfile::default());
        dev.interface_mut("Gi3");
        dev.interface_mut("Lo0").profile = Some(InterfaceProfile {
            kind: InterfaceKind::Loopback,
            address: Some("10.255.0.1/32".into()),
            ..Default::default()
        });

        let expected = expected_ipaddrs(&dev);
        assert_eq!(expected.len(), 2);
        assert!(expected.contains(&("Gi1".to_string(), "10.0.0.1/24".to_string())));
        assert!(expected.contains(&("Lo0".to_string(), "10.255.0.1/32".to_string())));
    }

    #[test]
    fn test_observed_skips_unassigned() {
        let records: Vec<IpAddressRecord> = serde_json::from_value(json!([
            {"id": 1, "address": "10.0.0.1/24", "assigned_object": {"id": 5, "name": "Gi1"}},
            {"id": 2, "address": "10.9.9.9/24", "assigned_object": null}
        ]))
        .unwrap();
        let map = observed_ipaddrs(records);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&("Gi1".to_string(), "10.0.0.1/24".to_string())].id, 1);
    }
}
