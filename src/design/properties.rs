//! Comparable property sets
//!
//! Each sync step reduces both the desired (design) and observed (NetBox)
//! state to one of these structs and diffs them field by field. The diff is
//! a set of field names, so `a - b == b - a` always holds.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Sub;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceField {
    Site,
    Status,
    DeviceRole,
    DeviceType,
    Platform,
    ProductModel,
    PrimaryIp,
}

impl DeviceField {
    pub const ALL: [DeviceField; 7] = [
        DeviceField::Site,
        DeviceField::Status,
        DeviceField::DeviceRole,
        DeviceField::DeviceType,
        DeviceField::Platform,
        DeviceField::ProductModel,
        DeviceField::PrimaryIp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceField::Site => "site",
            DeviceField::Status => "status",
            DeviceField::DeviceRole => "device_role",
            DeviceField::DeviceType => "device_type",
            DeviceField::Platform => "platform",
            DeviceField::ProductModel => "product_model",
            DeviceField::PrimaryIp => "primary_ip",
        }
    }
}

impl fmt::Display for DeviceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device-level properties compared during device reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DeviceProperties {
    pub site: String,
    pub status: String,
    pub device_role: String,
    pub device_type: String,
    pub platform: String,
    pub product_model: String,
    pub primary_ip: String,
}

impl DeviceProperties {
    pub fn get(&self, field: DeviceField) -> &str {
        match field {
            DeviceField::Site => &self.site,
            DeviceField::Status => &self.status,
            DeviceField::DeviceRole => &self.device_role,
            DeviceField::DeviceType => &self.device_type,
            DeviceField::Platform => &self.platform,
            DeviceField::ProductModel => &self.product_model,
            DeviceField::PrimaryIp => &self.primary_ip,
        }
    }

    pub fn mismatched_fields(&self, other: &Self) -> BTreeSet<DeviceField> {
        DeviceField::ALL
            .into_iter()
            .filter(|field| self.get(*field) != other.get(*field))
            .collect()
    }
}

impl Sub for &DeviceProperties {
    type Output = BTreeSet<DeviceField>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.mismatched_fields(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InterfaceField {
    Enabled,
    Description,
    IfType,
    Tags,
    MgmtOnly,
}

impl InterfaceField {
    pub const ALL: [InterfaceField; 5] = [
        InterfaceField::Enabled,
        InterfaceField::Description,
        InterfaceField::IfType,
        InterfaceField::Tags,
        InterfaceField::MgmtOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceField::Enabled => "enabled",
            InterfaceField::Description => "description",
            InterfaceField::IfType => "type",
            InterfaceField::Tags => "tags",
            InterfaceField::MgmtOnly => "mgmt_only",
        }
    }
}

impl fmt::Display for InterfaceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interface properties; `tags` is kept sorted so ordering never counts as drift
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InterfaceProperties {
    pub enabled: bool,
    pub description: String,
    pub if_type: String,
    pub tags: Vec<String>,
    pub mgmt_only: bool,
}

impl InterfaceProperties {
    pub fn new(enabled: bool, description: &str, if_type: &str, tags: &[String], mgmt_only: bool) -> Self {
        let mut tags = tags.to_vec();
        tags.sort();
        tags.dedup();
        Self {
            enabled,
            description: description.to_string(),
            if_type: if_type.to_string(),
            tags,
            mgmt_only,
        }
    }

    fn differs(&self, other: &Self, field: InterfaceField) -> bool {
        match field {
            InterfaceField::Enabled => self.enabled != other.enabled,
            InterfaceField::Description => self.description != other.description,
            InterfaceField::IfType => self.if_type != other.if_type,
            InterfaceField::Tags => self.tags != other.tags,
            InterfaceField::MgmtOnly => self.mgmt_only != other.mgmt_only,
        }
    }

    pub fn mismatched_fields(&self, other: &Self) -> BTreeSet<InterfaceField> {
        InterfaceField::ALL
            .into_iter()
            .filter(|field| self.differs(other, *field))
            .collect()
    }
}

impl Sub for &InterfaceProperties {
    type Output = BTreeSet<InterfaceField>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.mismatched_fields(rhs)
    }
}

/// Desired site record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SiteProperties {
    pub slug: String,
    pub name: String,
    pub description: String,
    /// Site-group slug
    pub group: Option<String>,
}

impl SiteProperties {
    /// Default site derived from its slug alone
    pub fn from_slug(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            description: String::new(),
            group: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> DeviceProperties {
        DeviceProperties {
            site: "hq".into(),
            status: "active".into(),
            device_role: "edge".into(),
            device_type: "CSR1000V".into(),
            platform: "iosxe".into(),
            product_model: "CSR1000V".into(),
            primary_ip: "10.0.0.1/32".into(),
        }
    }

    #[test]
    fn test_device_diff_empty_when_equal() {
        assert!((&props() - &props()).is_empty());
    }

    #[test]
    fn test_device_diff_reports_fields() {
        let mut other = props();
        other.site = "dc1".into();
        other.primary_ip = String::new();
        let diff = &props() - &other;
        assert_eq!(
            diff.into_iter().collect::<Vec<_>>(),
            vec![DeviceField::Site, DeviceField::PrimaryIp]
        );
    }

    #[test]
    fn test_interface_tags_order_insensitive() {
        let a = InterfaceProperties::new(true, "uplink", "1000base-t", &["b".into(), "a".into()], false);
        let b = InterfaceProperties::new(true, "uplink", "1000base-t", &["a".into(), "b".into()], false);
        assert!(a.mismatched_fields(&b).is_empty());
    }

    #[test]
    fn test_interface_diff() {
        let a = InterfaceProperties::new(true, "uplink", "1000base-t", &[], false);
        let b = InterfaceProperties::new(false, "uplink", "virtual", &[], true);
        let diff = &a - &b;
        assert!(diff.contains(&InterfaceField::Enabled));
        assert!(diff.contains(&InterfaceField::IfType));
        assert!(diff.contains(&InterfaceField::MgmtOnly));
        assert!(!diff.contains(&InterfaceField::Description));
    }

    #[test]
    fn test_site_from_slug() {
        let site = SiteProperties::from_slug("nyc1");
        assert_eq!(site.name, "NYC1");
        assert_eq!(site.group, None);
    }
}
