//! Synchronize a network design into NetBox, and build device inventories
//! back out of it.
//!
//! - [`netbox`] - operation-id dispatch, retrying transport, paging, lookups
//! - [`design`] - desired-state devices and the NetBox policy attached to them
//! - [`sync`] - reconciliation of devices, interfaces, LAGs, addresses, cabling
//! - [`inventory`] - design devices built from NetBox records
//! - [`config`] - connection and transport settings

pub mod config;
pub mod design;
pub mod inventory;
pub mod netbox;
pub mod sync;
