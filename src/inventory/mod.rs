//! Inventory built from NetBox records

pub mod builder;
pub mod registry;

pub use builder::DynamicInventory;
pub use registry::DeviceClassRegistry;
