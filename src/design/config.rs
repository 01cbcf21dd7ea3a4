use super::model::Device;
use super::properties::{DeviceProperties, SiteProperties};

/// NetBox policy a design carries: which devices are governed and with what
/// site, role and product model
pub trait DesignConfig: Send + Sync {
    /// Desired properties for `device`, or `None` when the device is excluded
    /// from NetBox
    fn device_properties(&self, device: &Device, status: &str) -> Option<DeviceProperties>;

    /// Desired properties of a site referenced by the design
    fn site_properties(&self, site_slug: &str) -> SiteProperties {
        SiteProperties::from_slug(site_slug)
    }
}
