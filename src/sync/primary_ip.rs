//! Primary IP assignment
//!
//! Runs after address sync, so a missing address record is reported as an
//! error rather than created here.

use super::ipaddrs::IpAddrMap;
use crate::design::Device;
use crate::netbox::records::{DeviceRecord, IpAddressRecord};
use crate::netbox::{Args, NetboxClient};
use serde_json::json;

/// The address record `primary_ip4` should point at, or `None` when the
/// device needs no write
pub fn primary_ip_target<'a>(
    dev: &Device,
    dev_rec: &DeviceRecord,
    ip_map: &'a IpAddrMap,
) -> Option<&'a IpAddressRecord> {
    let Some(iface) = dev.primary_interface() else {
        tracing::debug!("{}: no primary IP interface in design", dev.name);
        return None;
    };
    let Some(address) = iface.address() else {
        tracing::warn!("{}: primary IP interface {} has no address", dev.name, iface.name);
        return None;
    };

    let Some(ip_rec) = ip_map.get(&(iface.name.clone(), address.to_string())) else {
        tracing::error!(
            "{}: unexpectedly missing IP address for interface: {} address: {}, please check NetBox.",
            dev.name,
            iface.name,
            address
        );
        return None;
    };

    (dev_rec.primary_address() != address).then_some(ip_rec)
}

/// Point the device's `primary_ip4` at the address of its primary interface
pub async fn sync_primary_ip(client: &NetboxClient, dev: &Device, dev_rec: &DeviceRecord, ip_map: &IpAddrMap) {
    let Some(ip_rec) = primary_ip_target(dev, dev_rec, ip_map) else {
        return;
    };

    let args = Args::new().id(dev_rec.id).json(json!({ "primary_ip4": ip_rec.id }));
    match client.call("dcim_devices_partial_update", args).await {
        Ok(res) if !res.is_error() => {
            tracing::info!("{}: assigned IP {} as primary IP", dev.name, ip_rec.address);
        }
        Ok(res) => tracing::error!(
            "{}: failed to assign IP {} as primary IP: {}",
            dev.name,
            ip_rec.address,
            res.log_text()
        ),
        Err(e) => tracing::error!("{}: failed to assign IP {} as primary IP: {}", dev.name, ip_rec.address, e),
    }
}
