//! Shared device-class descriptors
//!
//! Every device with the same `(platform, device_type)` pair holds the same
//! `Arc<DeviceClass>`, so a few classes serve any number of devices.

use crate::design::model::DeviceClass;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct DeviceClassRegistry {
    classes: HashMap<DeviceClass, Arc<DeviceClass>>,
}

impl DeviceClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for the pair, created on first request
    pub fn get_or_create(&mut self, platform: Option<&str>, device_type: &str) -> Arc<DeviceClass> {
        let key = DeviceClass {
            platform: platform.filter(|p| !p.is_empty()).map(str::to_string),
            device_type: device_type.to_string(),
        };
        if let Some(existing) = self.classes.get(&key) {
            return Arc::clone(existing);
        }
        tracing::debug!("new device class {}", key);
        let class = Arc::new(key.clone());
        self.classes.insert(key, Arc::clone(&class));
        class
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_pair_shares_descriptor() {
        let mut reg = DeviceClassRegistry::new();
        let a = reg.get_or_create(Some("eos"), "DCS-7050");
        let b = reg.get_or_create(Some("eos"), "DCS-7050");
        let c = reg.get_or_create(Some("nxos"), "DCS-7050");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_empty_platform_is_none() {
        let mut reg = DeviceClassRegistry::new();
        let a = reg.get_or_create(Some(""), "PATCH-PANEL");
        let b = reg.get_or_create(None, "PATCH-PANEL");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.platform, None);
    }
}
