//! Desired-state network design and the NetBox policy attached to it

pub mod config;
pub mod file;
pub mod if_type;
pub mod model;
pub mod properties;

pub use config::DesignConfig;
pub use file::{load_design_file, FileDesignConfig};
pub use model::{Design, Device, DeviceClass, DeviceId, Endpoint, Interface, InterfaceKind, InterfaceProfile};
pub use properties::{DeviceProperties, InterfaceProperties, SiteProperties};
