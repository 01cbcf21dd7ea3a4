//! Dynamic inventory
//!
//! Builds design devices from NetBox device records. Records are cached by
//! remote id, so overlapping fetches never produce a second device for the
//! same record. Devices live in an arena addressed by [`DeviceId`], with maps
//! in both directions between arena slots and remote ids.

use super::registry::DeviceClassRegistry;
use crate::design::{Design, Device, DeviceId, InterfaceProfile};
use crate::netbox::records::DeviceRecord;
use crate::netbox::{fetch, NetboxClient, Result};
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Interface name used when a primary IP's interface cannot be determined
pub const FALLBACK_MGMT_INTERFACE: &str = "mgmt0";

#[derive(Debug, Default)]
pub struct DynamicInventory {
    records: BTreeMap<u64, DeviceRecord>,
    registry: DeviceClassRegistry,
    devices: Vec<Device>,
    origins: Vec<u64>,
    by_remote: HashMap<u64, DeviceId>,
}

impl DynamicInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page through `dcim_devices_list` with `params` and build any new devices
    pub async fn fetch_devices(&mut self, client: &NetboxClient, params: Map<String, Value>) -> Result<Vec<DeviceId>> {
        let records = fetch::fetch_all(client, "dcim_devices_list", params).await?;
        Ok(self.merge(client, records).await)
    }

    pub async fn fetch_devices_by_name(&mut self, client: &NetboxClient, names: &[String]) -> Result<Vec<DeviceId>> {
        let records = fetch::fetch_devices_by_name(client, names).await?;
        Ok(self.merge(client, records).await)
    }

    /// Add records to the cache; returns the ids of devices built for
    /// previously unseen records
    pub async fn merge(&mut self, client: &NetboxClient, records: Vec<DeviceRecord>) -> Vec<DeviceId> {
        let mut fresh = Vec::new();
        for rec in records {
            if !self.by_remote.contains_key(&rec.id) && !fresh.iter().any(|r: &DeviceRecord| r.id == rec.id) {
                fresh.push(rec.clone());
            }
            self.records.insert(rec.id, rec);
        }

        let primary_ifs = join_all(fresh.iter().map(|rec| primary_interface_name(client, rec))).await;

        fresh
            .iter()
            .zip(primary_ifs)
            .map(|(rec, if_name)| {
                let device = build_device(&mut self.registry, rec, if_name.as_deref());
                self.insert(rec.id, device)
            })
            .collect()
    }

    fn insert(&mut self, remote_id: u64, device: Device) -> DeviceId {
        let id = DeviceId(self.devices.len());
        self.devices.push(device);
        self.origins.push(remote_id);
        self.by_remote.insert(remote_id, id);
        id
    }

    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter().enumerate().map(|(i, d)| (DeviceId(i), d))
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    /// NetBox record a built device came from
    pub fn origin_of(&self, id: DeviceId) -> Option<&DeviceRecord> {
        let remote_id = self.origins.get(id.0)?;
        self.records.get(remote_id)
    }

    pub fn device_for_remote(&self, remote_id: u64) -> Option<DeviceId> {
        self.by_remote.get(&remote_id).copied()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn registry(&self) -> &DeviceClassRegistry {
        &self.registry
    }

    /// Copy of the built devices as a design
    pub fn to_design(&self, name: &str) -> Design {
        let mut design = Design::new(name);
        for device in &self.devices {
            design.add_device(device.clone());
        }
        design
    }
}

/// Name of the interface holding the record's primary IP
async fn primary_interface_name(client: &NetboxClient, rec: &DeviceRecord) -> Option<String> {
    let ip = rec.primary_ip.as_ref()?;
    match fetch::fetch_ip_address(client, ip.id).await {
        Ok(ip_rec) => Some(
            ip_rec
                .interface_name()
                .unwrap_or(FALLBACK_MGMT_INTERFACE)
                .to_string(),
        ),
        Err(e) => {
            tracing::warn!("{}: primary IP {} lookup failed: {}", rec.name, ip.address, e);
            Some(FALLBACK_MGMT_INTERFACE.to_string())
        }
    }
}

/// Design device for one record; `primary_if` names the interface carrying
/// the record's primary IP
pub fn build_device(registry: &mut DeviceClassRegistry, rec: &DeviceRecord, primary_if: Option<&str>) -> Device {
    let platform = rec.platform.as_ref().map(|p| p.slug.as_str());
    let device_type = rec
        .device_type
        .as_ref()
        .map(|dt| {
            if dt.model.is_empty() {
                dt.slug.to_uppercase()
            } else {
                dt.model.clone()
            }
        })
        .unwrap_or_default();

    let class = registry.get_or_create(platform, &device_type);
    let mut device = Device::new(&rec.name, class);
    device.exclusive = false;

    let address = rec.primary_address();
    if !address.is_empty() {
        let if_name = primary_if.unwrap_or(FALLBACK_MGMT_INTERFACE);
        device.interface_mut(if_name).profile = Some(InterfaceProfile::layer3(if_name, address));
        device.primary_ip_interface = Some(if_name.to_string());
    }

    device
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn record(id: u64, name: &str, platform: &str, model: &str, ip: Option<&str>) -> DeviceRecord {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "platform": {"id": 1, "slug": platform},
            "device_type": {"id": 2, "slug": model.to_lowercase(), "model": model},
            "primary_ip": ip.map(|a| json!({"id": 100 + id, "address": a})),
        }))
        .unwrap()
    }

    #[test]
    fn test_build_device_attaches_primary_ip() {
        let mut registry = DeviceClassRegistry::new();
        let rec = record(1, "sw1", "eos", "DCS-7050", Some("10.0.0.5/24"));
        let dev = build_device(&mut registry, &rec, Some("Management1"));

        assert_eq!(dev.name, "sw1");
        assert_eq!(dev.class.platform.as_deref(), Some("eos"));
        assert_eq!(dev.class.device_type, "DCS-7050");
        assert_eq!(dev.primary_ip_interface.as_deref(), Some("Management1"));
        assert_eq!(dev.primary_ip(), Some("10.0.0.5/24"));
        assert!(dev.interfaces["Management1"].profile.as_ref().unwrap().mgmt_only);
    }

    #[test]
    fn test_build_device_fallback_interface() {
        let mut registry = DeviceClassRegistry::new();
        let rec = record(1, "sw1", "eos", "DCS-7050", Some("10.0.0.5/24"));
        let dev = build_device(&mut registry, &rec, None);
        assert_eq!(dev.primary_ip_interface.as_deref(), Some(FALLBACK_MGMT_INTERFACE));
    }

    #[test]
    fn test_build_device_without_primary_ip() {
        let mut registry = DeviceClassRegistry::new();
        let dev = build_device(&mut registry, &record(1, "sw1", "eos", "DCS-7050", None), None);
        assert!(dev.primary_ip_interface.is_none());
        assert!(dev.interfaces.is_empty());
    }

    #[test]
    fn test_devices_share_class() {
        let mut registry = DeviceClassRegistry::new();
        let a = build_device(&mut registry, &record(1, "sw1", "eos", "DCS-7050", None), None);
        let b = build_device(&mut registry, &record(2, "sw2", "eos", "DCS-7050", None), None);
        assert!(Arc::ptr_eq(&a.class, &b.class));
        assert_eq!(registry.len(), 1);
    }
}
