//! YAML design files
//!
//! A design file lists devices, their interfaces and cabling, plus the NetBox
//! policy (site, role, product model) for each device. Loading produces a
//! [`Design`] with a [`FileDesignConfig`] attached.
//!
//! ```yaml
//! name: lab
//! netbox:
//!   site: hq
//!   role: leaf
//! sites:
//!   hq: { name: HQ, description: Headquarters, group: us-east }
//! devices:
//!   - name: leaf1
//!     platform: eos
//!     device_type: DCS-7050SX3
//!     primary_ip_interface: Management1
//!     interfaces:
//!       Management1:
//!         port: { form_factor: rj45, speed: 1000 }
//!         profile: { kind: physical, mgmt_only: true, address: 10.0.0.11/24 }
//!   - name: host1
//!     device_type: SERVER
//!     netbox: false
//! cables:
//!   - [leaf1:Ethernet1, leaf2:Ethernet1]
//! ```

use super::config::DesignConfig;
use super::model::{Design, Device, Endpoint, InterfaceKind, InterfaceProfile, PhyPort};
use super::properties::{DeviceProperties, SiteProperties};
use crate::inventory::registry::DeviceClassRegistry;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DesignFile {
    name: String,
    #[serde(default)]
    netbox: PolicyFields,
    #[serde(default)]
    sites: BTreeMap<String, SiteFields>,
    #[serde(default)]
    devices: Vec<DeviceFields>,
    #[serde(default)]
    cables: Vec<[String; 2]>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFields {
    site: Option<String>,
    role: Option<String>,
    product_model: Option<String>,
}

/// `netbox: false` excludes a device; a mapping overrides the design defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DevicePolicy {
    Enabled(bool),
    Fields(PolicyFields),
}

impl Default for DevicePolicy {
    fn default() -> Self {
        DevicePolicy::Enabled(true)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SiteFields {
    name: Option<String>,
    #[serde(default)]
    description: String,
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceFields {
    name: String,
    platform: Option<String>,
    device_type: String,
    #[serde(default = "default_true")]
    exclusive: bool,
    #[serde(default)]
    netbox: DevicePolicy,
    primary_ip_interface: Option<String>,
    #[serde(default)]
    interfaces: BTreeMap<String, InterfaceFields>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InterfaceFields {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: Vec<String>,
    port: Option<PhyPort>,
    profile: Option<ProfileFields>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ProfileKind {
    #[default]
    Physical,
    Lag,
    Loopback,
    Virtual,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileFields {
    #[serde(default)]
    name: String,
    #[serde(default)]
    kind: ProfileKind,
    #[serde(default)]
    members: Vec<String>,
    phy: Option<PhyPort>,
    address: Option<String>,
    #[serde(default)]
    mgmt_only: bool,
}

fn default_true() -> bool {
    true
}

impl From<ProfileFields> for InterfaceProfile {
    fn from(fields: ProfileFields) -> Self {
        let kind = match fields.kind {
            ProfileKind::Physical => InterfaceKind::Physical,
            ProfileKind::Lag => InterfaceKind::Lag { members: fields.members },
            ProfileKind::Loopback => InterfaceKind::Loopback,
            ProfileKind::Virtual => InterfaceKind::Virtual,
        };
        InterfaceProfile {
            name: fields.name,
            kind,
            phy: fields.phy,
            address: fields.address,
            mgmt_only: fields.mgmt_only,
        }
    }
}

/// Resolved NetBox policy of one device
#[derive(Debug, Clone, PartialEq, Eq)]
struct DevicePolicyEntry {
    site: String,
    role: String,
    product_model: Option<String>,
}

/// [`DesignConfig`] backed by a design file
#[derive(Debug, Default)]
pub struct FileDesignConfig {
    policies: HashMap<String, DevicePolicyEntry>,
    sites: HashMap<String, SiteProperties>,
}

impl DesignConfig for FileDesignConfig {
    fn device_properties(&self, device: &Device, status: &str) -> Option<DeviceProperties> {
        let policy = self.policies.get(&device.name)?;
        Some(DeviceProperties {
            site: policy.site.clone(),
            status: status.to_string(),
            device_role: policy.role.clone(),
            device_type: device.class.device_type.clone(),
            platform: device.class.platform.clone().unwrap_or_default(),
            product_model: policy
                .product_model
                .clone()
                .unwrap_or_else(|| device.class.device_type.clone()),
            primary_ip: device.primary_ip().unwrap_or_default().to_string(),
        })
    }

    fn site_properties(&self, site_slug: &str) -> SiteProperties {
        self.sites
            .get(site_slug)
            .cloned()
            .unwrap_or_else(|| SiteProperties::from_slug(site_slug))
    }
}

pub fn load_design_file(path: &Path, registry: &mut DeviceClassRegistry) -> Result<Design> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read design file {}", path.display()))?;
    parse_design(&content, registry)
        .with_context(|| format!("Invalid design file {}", path.display()))
}

pub fn parse_design(content: &str, registry: &mut DeviceClassRegistry) -> Result<Design> {
    let file: DesignFile = serde_yaml::from_str(content)?;
    let mut design = Design::new(&file.name);
    let mut config = FileDesignConfig::default();

    for (slug, site) in file.sites {
        let props = SiteProperties {
            name: site.name.unwrap_or_else(|| slug.to_uppercase()),
            description: site.description,
            group: site.group,
            slug: slug.clone(),
        };
        config.sites.insert(slug, props);
    }

    for fields in file.devices {
        let policy = match fields.netbox {
            DevicePolicy::Enabled(false) => None,
            DevicePolicy::Enabled(true) => Some(file.netbox.clone()),
            DevicePolicy::Fields(over) => Some(PolicyFields {
                site: over.site.or_else(|| file.netbox.site.clone()),
                role: over.role.or_else(|| file.netbox.role.clone()),
                product_model: over.product_model.or_else(|| file.netbox.product_model.clone()),
            }),
        };

        if let Some(policy) = policy {
            let (Some(site), Some(role)) = (policy.site, policy.role) else {
                bail!("device {}: NetBox site and role are required", fields.name);
            };
            config.policies.insert(
                fields.name.clone(),
                DevicePolicyEntry {
                    site,
                    role,
                    product_model: policy.product_model,
                },
            );
        }

        let class = registry.get_or_create(fields.platform.as_deref(), &fields.device_type);
        let mut device = Device::new(&fields.name, class);
        device.exclusive = fields.exclusive;
        device.primary_ip_interface = fields.primary_ip_interface;

        for (if_name, if_fields) in fields.interfaces {
            let iface = device.interface_mut(&if_name);
            iface.enabled = if_fields.enabled;
            iface.description = if_fields.description;
            iface.tags = if_fields.tags;
            iface.port = if_fields.port;
            iface.profile = if_fields.profile.map(InterfaceProfile::from);
        }

        if let Some(pri) = &device.primary_ip_interface {
            if !device.interfaces.contains_key(pri) {
                bail!("device {}: primary IP interface {} is not defined", device.name, pri);
            }
        }

        design.add_device(device);
    }

    for [a, b] in &file.cables {
        let (Some(a_end), Some(b_end)) = (Endpoint::parse(a), Endpoint::parse(b)) else {
            bail!("cable {} -- {}: endpoints must be device:interface", a, b);
        };
        if !design.connect(&a_end, &b_end) {
            bail!("cable {} -- {}: unknown device", a, b);
        }
    }

    design.set_config(Arc::new(config));
    Ok(design)
}
