//! Remote record shapes
//!
//! Only the fields the sync and inventory code reads are modelled; anything
//! else NetBox sends is ignored. Nullable strings decode to `""` so that
//! property comparisons never trip over `null` versus empty.

use serde::{Deserialize, Deserializer};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Brief nested object, as NetBox embeds foreign keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NestedRef {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

/// Choice field, e.g. `{"value": "active", "label": "Active"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChoiceValue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
}

/// Brief IP address reference (e.g. a device's `primary_ip`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NestedIp {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TagRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
}

/// `dcim.device`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub status: Option<ChoiceValue>,
    #[serde(default)]
    pub site: Option<NestedRef>,
    #[serde(default)]
    pub device_type: Option<NestedRef>,
    /// NetBox < 4.0
    #[serde(default)]
    pub device_role: Option<NestedRef>,
    /// NetBox >= 3.6
    #[serde(default)]
    pub role: Option<NestedRef>,
    #[serde(default)]
    pub platform: Option<NestedRef>,
    #[serde(default)]
    pub primary_ip: Option<NestedIp>,
}

impl DeviceRecord {
    pub fn role(&self) -> Option<&NestedRef> {
        self.device_role.as_ref().or(self.role.as_ref())
    }

    pub fn status_value(&self) -> &str {
        self.status.as_ref().map(|s| s.value.as_str()).unwrap_or("")
    }

    pub fn primary_address(&self) -> &str {
        self.primary_ip.as_ref().map(|ip| ip.address.as_str()).unwrap_or("")
    }
}

/// `dcim.devicetype` detail
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceTypeRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub part_number: String,
}

/// Link peer of an interface. Circuit terminations have no device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LinkPeer {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub device: Option<NestedRef>,
}

/// `dcim.interface`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InterfaceRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub device: NestedRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", default)]
    pub if_type: Option<ChoiceValue>,
    #[serde(default)]
    pub lag: Option<NestedRef>,
    #[serde(default)]
    pub cable: Option<NestedRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub link_peers: Vec<LinkPeer>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mgmt_only: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<TagRef>,
}

impl InterfaceRecord {
    pub fn type_value(&self) -> &str {
        self.if_type.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }

    pub fn tag_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.tags.iter().map(|t| t.slug.clone()).collect();
        slugs.sort();
        slugs
    }
}

/// Object an IP address is assigned to
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AssignedObject {
    #[serde(default)]
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub device: Option<NestedRef>,
}

/// `ipam.ipaddress`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IpAddressRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    #[serde(default)]
    pub assigned_object: Option<AssignedObject>,
}

impl IpAddressRecord {
    /// Name of the interface the address is assigned to, if any
    pub fn interface_name(&self) -> Option<&str> {
        self.assigned_object
            .as_ref()
            .map(|o| o.name.as_str())
            .filter(|n| !n.is_empty())
    }
}

/// Any slug-addressed taxonomy object (site, platform, role, site-group)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObjectRecord {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_device_record_tolerates_nulls() {
        let rec: DeviceRecord = serde_json::from_value(json!({
            "id": 7,
            "name": "r1",
            "status": {"value": "planned", "label": "Planned"},
            "site": {"id": 1, "slug": "hq", "name": "HQ"},
            "device_type": {"id": 2, "model": "CSR1000V", "display": "CSR1000V", "url": "http://nb/api/dcim/device-types/2/"},
            "device_role": {"id": 3, "slug": "edge"},
            "platform": null,
            "primary_ip": null,
            "comments": "extra fields are ignored"
        }))
        .unwrap();

        assert_eq!(rec.status_value(), "planned");
        assert_eq!(rec.role().unwrap().slug, "edge");
        assert!(rec.platform.is_none());
        assert_eq!(rec.primary_address(), "");
    }

    #[test]
    fn test_device_record_newer_role_field() {
        let rec: DeviceRecord = serde_json::from_value(json!({
            "id": 7, "name": "r1", "role": {"id": 9, "slug": "spine"}
        }))
        .unwrap();
        assert_eq!(rec.role().unwrap().id, 9);
    }

    #[test]
    fn test_interface_record() {
        let rec: InterfaceRecord = serde_json::from_value(json!({
            "id": 11,
            "name": "eth1",
            "device": {"id": 7, "name": "r1"},
            "enabled": true,
            "description": null,
            "type": {"value": "1000base-t", "label": "1000BASE-T (1GE)"},
            "lag": null,
            "cable": {"id": 99},
            "link_peers": [{"id": 12, "name": "eth2", "device": {"id": 8, "name": "r3"}}],
            "tags": [{"name": "B", "slug": "b"}, {"name": "A", "slug": "a"}]
        }))
        .unwrap();

        assert_eq!(rec.description, "");
        assert_eq!(rec.type_value(), "1000base-t");
        assert_eq!(rec.cable.as_ref().unwrap().id, 99);
        assert_eq!(rec.link_peers[0].device.as_ref().unwrap().name, "r3");
        assert_eq!(rec.tag_slugs(), vec!["a", "b"]);
    }

    #[test]
    fn test_ip_address_interface_name() {
        let rec: IpAddressRecord = serde_json::from_value(json!({
            "id": 5, "address": "10.0.0.1/32",
            "assigned_object": {"id": 11, "name": "Loopback0", "device": {"id": 7, "name": "r1"}}
        }))
        .unwrap();
        assert_eq!(rec.interface_name(), Some("Loopback0"));

        let orphan: IpAddressRecord =
            serde_json::from_value(json!({"id": 6, "address": "10.0.0.2/32", "assigned_object": null})).unwrap();
        assert_eq!(orphan.interface_name(), None);
    }
}
