//! Design model
//!
//! The desired-state network: devices, their interfaces and profiles, and
//! cabling. Devices live in an arena inside [`Design`] and are addressed by
//! [`DeviceId`]; cable peers are named by [`Endpoint`] rather than by reference.

use super::config::DesignConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Transceiver / connector form factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    Rj45,
    Sfp,
    #[serde(alias = "sfp+")]
    Sfpp,
    Sfp28,
    Sfp56,
    #[serde(alias = "qsfp+")]
    Qsfpp,
    Qsfp28,
    Qsfp56,
    Qsfpdd,
    Osfp,
}

/// Port speeds, in Mbps
pub mod speed {
    pub const M100: u32 = 100;
    pub const G1: u32 = 1_000;
    pub const G2_5: u32 = 2_500;
    pub const G5: u32 = 5_000;
    pub const G10: u32 = 10_000;
    pub const G25: u32 = 25_000;
    pub const G40: u32 = 40_000;
    pub const G50: u32 = 50_000;
    pub const G100: u32 = 100_000;
}

/// Physical characteristics of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhyPort {
    pub form_factor: FormFactor,
    /// Mbps
    pub speed: u32,
}

/// What an interface is, logically
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InterfaceKind {
    #[default]
    Physical,
    Lag {
        members: Vec<String>,
    },
    Loopback,
    Virtual,
}

/// Role assigned to a used interface
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceProfile {
    pub name: String,
    pub kind: InterfaceKind,
    /// Optics / cabling in use, overriding the hardware port
    pub phy: Option<PhyPort>,
    /// Layer-3 address in CIDR form, e.g. `10.0.0.1/31`
    pub address: Option<String>,
    pub mgmt_only: bool,
}

impl InterfaceProfile {
    pub fn is_lag(&self) -> bool {
        matches!(self.kind, InterfaceKind::Lag { .. })
    }

    pub fn lag_members(&self) -> &[String] {
        match &self.kind {
            InterfaceKind::Lag { members } => members,
            _ => &[],
        }
    }

    /// Layer-3 profile for a management interface
    pub fn layer3(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: InterfaceKind::Physical,
            phy: None,
            address: Some(address.to_string()),
            mgmt_only: true,
        }
    }
}

/// `(device-name, interface-name)` key for one end of a cable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Endpoint {
    pub device: String,
    pub interface: String,
}

impl Endpoint {
    pub fn new(device: &str, interface: &str) -> Self {
        Self {
            device: device.to_string(),
            interface: interface.to_string(),
        }
    }

    /// Parse `device:interface`
    pub fn parse(text: &str) -> Option<Self> {
        let (device, interface) = text.split_once(':')?;
        if device.is_empty() || interface.is_empty() {
            return None;
        }
        Some(Self::new(device, interface))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Interface {
    pub name: String,
    pub enabled: bool,
    pub description: String,
    pub tags: Vec<String>,
    /// Hardware port from the device-type, used when the interface is unprofiled
    pub port: Option<PhyPort>,
    pub profile: Option<InterfaceProfile>,
    pub cable_peer: Option<Endpoint>,
}

impl Interface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            ..Default::default()
        }
    }

    /// An interface is in use once it has a profile
    pub fn is_used(&self) -> bool {
        self.profile.is_some()
    }

    pub fn is_lag(&self) -> bool {
        self.profile.as_ref().is_some_and(|p| p.is_lag())
    }

    pub fn address(&self) -> Option<&str> {
        self.profile
            .as_ref()
            .and_then(|p| p.address.as_deref())
            .filter(|a| !a.is_empty())
    }
}

/// Shared descriptor of a device's platform and hardware type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceClass {
    pub platform: Option<String>,
    pub device_type: String,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.platform {
            Some(platform) => write!(f, "{}_{}", platform, self.device_type),
            None => write!(f, "{}", self.device_type),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Device {
    pub name: String,
    pub class: Arc<DeviceClass>,
    /// The design is the sole authority for this device; unexpected remote
    /// state may be removed
    pub exclusive: bool,
    pub interfaces: BTreeMap<String, Interface>,
    pub primary_ip_interface: Option<String>,
}

impl Device {
    pub fn new(name: &str, class: Arc<DeviceClass>) -> Self {
        Self {
            name: name.to_string(),
            class,
            exclusive: true,
            interfaces: BTreeMap::new(),
            primary_ip_interface: None,
        }
    }

    /// Interface by name, created on first use
    pub fn interface_mut(&mut self, name: &str) -> &mut Interface {
        self.interfaces
            .entry(name.to_string())
            .or_insert_with(|| Interface::new(name))
    }

    pub fn used_interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values().filter(|i| i.is_used())
    }

    pub fn primary_interface(&self) -> Option<&Interface> {
        self.primary_ip_interface
            .as_deref()
            .and_then(|name| self.interfaces.get(name))
    }

    /// Address of the primary management interface
    pub fn primary_ip(&self) -> Option<&str> {
        self.primary_interface().and_then(|i| i.address())
    }
}

/// Index of a device in its design's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub usize);

/// A named collection of devices plus the NetBox policy that governs them
#[derive(Clone, Default)]
pub struct Design {
    pub name: String,
    devices: Vec<Device>,
    by_name: HashMap<String, DeviceId>,
    config: Option<Arc<dyn DesignConfig>>,
}

impl fmt::Debug for Design {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Design")
            .field("name", &self.name)
            .field("devices", &self.devices.len())
            .field("config", &self.config.is_some())
            .finish()
    }
}

impl Design {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Add a device, replacing any device of the same name
    pub fn add_device(&mut self, device: Device) -> DeviceId {
        if let Some(&id) = self.by_name.get(&device.name) {
            self.devices[id.0] = device;
            return id;
        }
        let id = DeviceId(self.devices.len());
        self.by_name.insert(device.name.clone(), id);
        self.devices.push(device);
        id
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    pub fn device_id(&self, name: &str) -> Option<DeviceId> {
        self.by_name.get(name).copied()
    }

    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.device_id(name).and_then(|id| self.device(id))
    }

    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter().enumerate().map(|(i, d)| (DeviceId(i), d))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Connect two interfaces, recording each as the other's cable peer
    pub fn connect(&mut self, a: &Endpoint, b: &Endpoint) -> bool {
        let (Some(a_id), Some(b_id)) = (self.device_id(&a.device), self.device_id(&b.device)) else {
            return false;
        };
        self.devices[a_id.0].interface_mut(&a.interface).cable_peer = Some(b.clone());
        self.devices[b_id.0].interface_mut(&b.interface).cable_peer = Some(a.clone());
        true
    }

    pub fn set_config(&mut self, config: Arc<dyn DesignConfig>) {
        self.config = Some(config);
    }

    /// NetBox policy attached to this design
    pub fn config(&self) -> Option<&Arc<dyn DesignConfig>> {
        self.config.as_ref()
    }
}
