//! Record reconciliation
//!
//! Each submodule compares one slice of desired state (from a [`Design`])
//! against what NetBox holds and issues the writes needed to converge.
//! Per-item write failures are logged and skipped; only missing taxonomy
//! (site, device-type, role, platform) or a failed device write abort a
//! device's push.
//!
//! [`Design`]: crate::design::Design

pub mod cabling;
pub mod device;
pub mod interfaces;
pub mod ipaddrs;
pub mod lags;
pub mod primary_ip;
pub mod push;
pub mod sites;

pub use cabling::{cable_key, sync_cabling, CableKey, CablingSummary};
pub use push::{push_devices, PushSummary};

/// Switches that widen or narrow what a push is allowed to change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Restrict the push to these device names; empty means every device
    pub devices: Vec<String>,
    /// Delete NetBox interfaces missing from the design (exclusive devices only)
    pub prune_interfaces: bool,
    /// Delete NetBox IP addresses missing from the design (exclusive devices only)
    pub prune_ip_addresses: bool,
    pub no_cabling: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            prune_interfaces: false,
            prune_ip_addresses: true,
            no_cabling: false,
        }
    }
}
