//! Push orchestration
//!
//! Sites first, then every selected device concurrently (device, interfaces,
//! LAGs, IP addresses, primary IP), then cabling across the pushed set.

use super::cabling::{sync_cabling, CablingSummary};
use super::{device, interfaces, ipaddrs, lags, primary_ip, sites, SyncOptions};
use crate::design::{Design, Device, DeviceProperties, SiteProperties};
use crate::netbox::{NetboxClient, Result};
use futures::future::join_all;
use std::collections::{BTreeSet, HashSet};

/// A design device selected for push, with its desired properties
pub struct PushTarget<'a> {
    pub design: &'a Design,
    pub device: &'a Device,
    pub props: DeviceProperties,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushSummary {
    pub sites_created: usize,
    pub pushed: Vec<String>,
    pub failed: Vec<String>,
    pub cabling: Option<CablingSummary>,
}

/// Devices to push: selected by name (if any names are given) and not
/// excluded by their design's NetBox policy
pub fn collect_targets<'a>(designs: &'a [Design], status: &str, only: &[String]) -> Vec<PushTarget<'a>> {
    let mut targets = Vec::new();
    for design in designs {
        let Some(config) = design.config() else {
            tracing::warn!("design {}: no NetBox configuration, skipping", design.name);
            continue;
        };
        for (_, dev) in design.devices() {
            if !only.is_empty() && !only.contains(&dev.name) {
                continue;
            }
            match config.device_properties(dev, status) {
                Some(props) => targets.push(PushTarget {
                    design,
                    device: dev,
                    props,
                }),
                None => tracing::debug!("{}: excluded from NetBox", dev.name),
            }
        }
    }
    targets
}

/// Desired sites referenced by the targets
pub fn target_sites(targets: &[PushTarget<'_>]) -> BTreeSet<SiteProperties> {
    targets
        .iter()
        .filter_map(|t| Some(t.design.config()?.site_properties(&t.props.site)))
        .collect()
}

/// Push one device. Only the device record step can fail the push; later
/// steps log their own failures.
pub async fn push_device(
    client: &NetboxClient,
    dev: &Device,
    props: &DeviceProperties,
    options: &SyncOptions,
) -> Result<()> {
    tracing::info!("{}: Pushing device into NetBox ...", dev.name);

    let dev_rec = device::sync_device(client, dev, props).await?;

    let if_map = match interfaces::sync_interfaces(client, dev, &dev_rec, options).await {
        Ok(map) => map,
        Err(e) => {
            tracing::error!("{}: interface sync failed: {}", dev.name, e);
            return Ok(());
        }
    };

    lags::sync_lags(client, dev, &if_map).await;

    match ipaddrs::sync_ipaddrs(client, dev, &dev_rec, &if_map, options).await {
        Ok(ip_map) => primary_ip::sync_primary_ip(client, dev, &dev_rec, &ip_map).await,
        Err(e) => tracing::error!("{}: IP address sync failed: {}", dev.name, e),
    }

    tracing::info!("{}: Pushing device into NetBox completed.", dev.name);
    Ok(())
}

pub async fn push_devices(
    client: &NetboxClient,
    designs: &[Design],
    status: &str,
    options: &SyncOptions,
) -> PushSummary {
    let targets = collect_targets(designs, status, &options.devices);
    let mut summary = PushSummary::default();

    if targets.is_empty() {
        tracing::warn!("No devices to push");
        return summary;
    }

    summary.sites_created = sites::ensure_sites(client, &target_sites(&targets)).await;

    let results = join_all(
        targets
            .iter()
            .map(|t| async move { (t.device, push_device(client, t.device, &t.props, options).await) }),
    )
    .await;

    for (dev, result) in results {
        match result {
            Ok(()) => summary.pushed.push(dev.name.clone()),
            Err(e) => {
                tracing::error!("{}: {}", dev.name, e);
                tracing::error!("{}: aborting further NetBox push due to prior errors.", dev.name);
                summary.failed.push(dev.name.clone());
            }
        }
    }

    if !options.no_cabling {
        let governed: HashSet<String> = targets.iter().map(|t| t.device.name.clone()).collect();
        let cabling = sync_cabling(client, targets.iter().map(|t| t.device), &governed).await;
        summary.cabling = Some(cabling);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::registry::DeviceClassRegistry;

    const DESIGN: &str = r#"
name: lab
netbox: { site: hq, role: edge }
sites:
  hq: { name: Headquarters }
devices:
  - { name: r1, platform: iosxe, device_type: CSR1000V }
  - { name: r2, platform: iosxe, device_type: CSR1000V, netbox: { site: dc1 } }
  - { name: host1, device_type: SERVER, netbox: false }
"#;

    fn designs() -> Vec<Design> {
        let mut registry = DeviceClassRegistry::new();
        vec![crate::design::file::parse_design(DESIGN, &mut registry).unwrap()]
    }

    #[test]
    fn test_collect_targets_skips_excluded() {
        let designs = designs();
        let targets = collect_targets(&designs, "active", &[]);
        let names: Vec<_> = targets.iter().map(|t| t.device.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2"]);
        assert!(targets.iter().all(|t| t.props.status == "active"));
    }

    #[test]
    fn test_collect_targets_by_name() {
        let designs = designs();
        let targets = collect_targets(&designs, "planned", &["r2".to_string(), "host1".to_string()]);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].props.site, "dc1");
    }

    #[test]
    fn test_target_sites() {
        let designs = designs();
        let targets = collect_targets(&designs, "active", &[]);
        let sites = target_sites(&targets);
        let slugs: Vec<_> = sites.iter().map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["dc1", "hq"]);
        assert!(sites.iter().any(|s| s.name == "Headquarters"));
    }
}
