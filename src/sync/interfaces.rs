//! Interface record reconciliation

use super::SyncOptions;
use crate::design::if_type::netbox_interface_type;
use crate::design::{Device, Interface, InterfaceProperties};
use crate::netbox::records::{DeviceRecord, InterfaceRecord};
use crate::netbox::{fetch, Args, NetboxClient, Result};
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// NetBox interface records of one device, by interface name
pub type InterfaceMap = BTreeMap<String, InterfaceRecord>;

/// How the design's interface names line up with NetBox
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InterfacePlan {
    pub create: BTreeSet<String>,
    pub check: BTreeSet<String>,
    pub unexpected: BTreeSet<String>,
}

pub fn plan_interfaces(dev: &Device, remote: &InterfaceMap) -> InterfacePlan {
    let expected: BTreeSet<&String> = dev.interfaces.keys().collect();
    let has: BTreeSet<&String> = remote.keys().collect();

    InterfacePlan {
        create: expected.difference(&has).map(|s| s.to_string()).collect(),
        check: expected.intersection(&has).map(|s| s.to_string()).collect(),
        unexpected: has.difference(&expected).map(|s| s.to_string()).collect(),
    }
}

pub fn desired_properties(dev: &Device, iface: &Interface) -> InterfaceProperties {
    InterfaceProperties::new(
        iface.enabled,
        &iface.description,
        netbox_interface_type(&dev.name, iface),
        &iface.tags,
        iface.profile.as_ref().is_some_and(|p| p.mgmt_only),
    )
}

pub fn observed_properties(rec: &InterfaceRecord) -> InterfaceProperties {
    InterfaceProperties::new(
        rec.enabled,
        &rec.description,
        rec.type_value(),
        &rec.tag_slugs(),
        rec.mgmt_only,
    )
}

fn interface_body(name: &str, props: &InterfaceProperties) -> Value {
    let tags: Vec<Value> = props.tags.iter().map(|t| json!({ "slug": t })).collect();
    json!({
        "name": name,
        "type": props.if_type,
        "description": props.description,
        "enabled": props.enabled,
        "mgmt_only": props.mgmt_only,
        "tags": tags,
    })
}

/// Sync the interfaces of `dev` and return the resulting NetBox records
pub async fn sync_interfaces(
    client: &NetboxClient,
    dev: &Device,
    dev_rec: &DeviceRecord,
    options: &SyncOptions,
) -> Result<InterfaceMap> {
    let mut if_map: InterfaceMap = fetch::fetch_device_interfaces(client, dev_rec.id)
        .await?
        .into_iter()
        .map(|rec| (rec.name.clone(), rec))
        .collect();

    let plan = plan_interfaces(dev, &if_map);

    if !plan.unexpected.is_empty() {
        if dev.exclusive && options.prune_interfaces {
            for name in delete_interfaces(client, dev, &plan.unexpected, &if_map).await {
                if_map.remove(&name);
            }
        } else {
            tracing::info!(
                "{}: {} NetBox interfaces not in design, leaving as-is",
                dev.name,
                plan.unexpected.len()
            );
        }
    }

    let created = join_all(
        plan.create
            .iter()
            .filter_map(|name| dev.interfaces.get(name))
            .map(|iface| create_interface(client, dev, dev_rec.id, iface)),
    )
    .await;
    if_map.extend(created.into_iter().flatten().map(|rec| (rec.name.clone(), rec)));

    let updated = join_all(plan.check.iter().filter_map(|name| {
        let iface = dev.interfaces.get(name)?;
        let rec = if_map.get(name)?;
        Some(update_interface(client, dev, iface, rec))
    }))
    .await;
    if_map.extend(updated.into_iter().flatten().map(|rec| (rec.name.clone(), rec)));

    Ok(if_map)
}

async fn create_interface(
    client: &NetboxClient,
    dev: &Device,
    device_id: u64,
    iface: &Interface,
) -> Option<InterfaceRecord> {
    let props = desired_properties(dev, iface);
    let mut body = interface_body(&iface.name, &props);
    body["device"] = Value::from(device_id);

    let res = match client.call("dcim_interfaces_create", Args::new().json(body)).await {
        Ok(res) => res,
        Err(e) => {
            tracing::error!("{}: {}: failed to be created: {}", dev.name, iface.name, e);
            return None;
        }
    };
    if res.is_error() {
        tracing::error!("{}: {}: failed to be created: {}", dev.name, iface.name, res.log_text());
        return None;
    }

    tracing::info!("{}: {}: created OK.", dev.name, iface.name);
    log_decode(dev, &iface.name, res.json())
}

async fn update_interface(
    client: &NetboxClient,
    dev: &Device,
    iface: &Interface,
    rec: &InterfaceRecord,
) -> Option<InterfaceRecord> {
    let expected = desired_properties(dev, iface);
    let mismatch = &expected - &observed_properties(rec);
    if mismatch.is_empty() {
        return None;
    }

    let names: Vec<&str> = mismatch.iter().map(|f| f.as_str()).collect();
    tracing::debug!("{}: {}: updating {}", dev.name, iface.name, names.join(", "));

    let args = Args::new().id(rec.id).json(interface_body(&iface.name, &expected));
    let res = match client.call("dcim_interfaces_partial_update", args).await {
        Ok(res) => res,
        Err(e) => {
            tracing::error!("{}: {} update failed: {}", dev.name, iface.name, e);
            return None;
        }
    };
    if res.is_error() {
        tracing::error!("{}: {} update failed: {}", dev.name, iface.name, res.log_text());
        return None;
    }

    tracing::info!("{}: {}: updated OK", dev.name, iface.name);
    log_decode(dev, &iface.name, res.json())
}

/// Delete the named records; returns the names actually removed
async fn delete_interfaces(
    client: &NetboxClient,
    dev: &Device,
    names: &BTreeSet<String>,
    if_map: &InterfaceMap,
) -> Vec<String> {
    let results = join_all(names.iter().filter_map(|name| if_map.get(name)).map(|rec| async move {
        match client.call("dcim_interfaces_delete", Args::new().id(rec.id)).await {
            Ok(res) if !res.is_error() => {
                tracing::info!("{}: {}: removed OK", dev.name, rec.name);
                Some(rec.name.clone())
            }
            Ok(res) => {
                tracing::error!("{}: {}: failed to remove: {}", dev.name, rec.name, res.log_text());
                None
            }
            Err(e) => {
                tracing::error!("{}: {}: failed to remove: {}", dev.name, rec.name, e);
                None
            }
        }
    }))
    .await;
    results.into_iter().flatten().collect()
}

fn log_decode(dev: &Device, if_name: &str, rec: Result<InterfaceRecord>) -> Option<InterfaceRecord> {
    rec.map_err(|e| tracing::error!("{}: {}: unreadable NetBox response: {}", dev.name, if_name, e))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::model::{DeviceClass, FormFactor, InterfaceProfile, PhyPort};
    use std::sync::Arc;

    fn device() -> Device {
        let class = Arc::new(DeviceClass {
            platform: Some("eos".into()),
            device_type: "DCS-7050".into(),
        });
        let mut dev = Device::new("leaf1", class);
        for name in ["Ethernet1", "Ethernet2"] {
            dev.interface_mut(name).port = Some(PhyPort {
                form_factor: FormFactor::Sfp28,
                speed: 25_000,
            });
        }
        dev
    }

    fn remote(name: &str, if_type: &str) -> InterfaceRecord {
        serde_json::from_value(json!({
            "id": 1,
            "name": name,
            "device": {"id": 10, "name": "leaf1"},
            "enabled": true,
            "description": "",
            "type": {"value": if_type, "label": if_type},
            "tags": []
        }))
        .unwrap()
    }

    #[test]
    fn test_plan_partitions_names() {
        let dev = device();
        let mut if_map = InterfaceMap::new();
        if_map.insert("Ethernet1".into(), remote("Ethernet1", "25gbase-x-sfp28"));
        if_map.insert("Ethernet9".into(), remote("Ethernet9", "other"));

        let plan = plan_interfaces(&dev, &if_map);
        assert_eq!(plan.create, ["Ethernet2".to_string()].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(plan.check, ["Ethernet1".to_string()].into_iter().collect::<BTreeSet<_>>());
        assert_eq!(plan.unexpected, ["Ethernet9".to_string()].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_properties_match_when_in_sync() {
        let dev = device();
        let rec = remote("Ethernet1", "25gbase-x-sfp28");
        let desired = desired_properties(&dev, &dev.interfaces["Ethernet1"]);
        assert!((&desired - &observed_properties(&rec)).is_empty());
    }

    #[test]
    fn test_mgmt_only_from_profile() {
        let mut dev = device();
        dev.interface_mut("Ethernet1").profile = Some(InterfaceProfile::layer3("mgmt", "10.0.0.1/24"));
        let desired = desired_properties(&dev, &dev.interfaces["Ethernet1"]);
        assert!(desired.mgmt_only);
        let body = interface_body("Ethernet1", &desired);
        assert_eq!(body["mgmt_only"], json!(true));
        assert_eq!(body["type"], json!("25gbase-x-sfp28"));
    }
}
