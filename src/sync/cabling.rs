//! Cabling reconciliation
//!
//! Cabling is reconciled across the whole set of pushed devices at once. The
//! desired topology is a set of [`CableKey`]s, each an endpoint pair sorted so
//! that `(a, b)` and `(b, a)` are the same cable. Planning is pure
//! ([`plan_cabling`]); [`sync_cabling`] fetches the endpoint records, runs the
//! planner, then deletes before it creates.

use crate::design::{Device, Endpoint};
use crate::netbox::records::InterfaceRecord;
use crate::netbox::{fetch, Args, NetboxClient};
use futures::future::join_all;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// An unordered endpoint pair, stored with `a <= b`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CableKey {
    pub a: Endpoint,
    pub b: Endpoint,
}

pub fn cable_key(x: &Endpoint, y: &Endpoint) -> CableKey {
    if x <= y {
        CableKey { a: x.clone(), b: y.clone() }
    } else {
        CableKey { a: y.clone(), b: x.clone() }
    }
}

impl std::fmt::Display for CableKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -- {}", self.a, self.b)
    }
}

/// Desired cables among `devices`, skipping LAG interfaces and any peer on a
/// device outside `governed`
pub fn desired_cables<'a>(
    devices: impl IntoIterator<Item = &'a Device>,
    governed: &HashSet<String>,
) -> BTreeSet<CableKey> {
    let mut cables = BTreeSet::new();
    for dev in devices {
        for iface in dev.interfaces.values() {
            let Some(peer) = &iface.cable_peer else { continue };
            if iface.is_lag() {
                continue;
            }
            if !governed.contains(&peer.device) {
                tracing::debug!("{}:{} peer {} is not governed, skipping", dev.name, iface.name, peer);
                continue;
            }
            cables.insert(cable_key(&Endpoint::new(&dev.name, &iface.name), peer));
        }
    }
    cables
}

/// Endpoint an interface is currently cabled to, when NetBox can name it
fn link_peer(rec: &InterfaceRecord) -> Option<Endpoint> {
    rec.link_peers
        .iter()
        .find_map(|peer| Some(Endpoint::new(&peer.device.as_ref()?.name, &peer.name)))
}

fn cable_id(rec: &InterfaceRecord) -> Option<u64> {
    rec.cable.as_ref().map(|c| c.id)
}

/// Writes needed to converge cabling
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CablePlan {
    /// Cable id to remove, with the endpoint it was found on
    pub delete: BTreeMap<u64, Endpoint>,
    pub create: BTreeSet<CableKey>,
    /// Desired cables with an endpoint NetBox does not have
    pub skipped: BTreeSet<CableKey>,
}

impl CablePlan {
    pub fn is_empty(&self) -> bool {
        self.delete.is_empty() && self.create.is_empty()
    }
}

pub fn plan_cabling(desired: &BTreeSet<CableKey>, remote: &HashMap<Endpoint, InterfaceRecord>) -> CablePlan {
    let mut plan = CablePlan::default();

    for key in desired {
        let (Some(lcl), Some(rmt)) = (remote.get(&key.a), remote.get(&key.b)) else {
            plan.skipped.insert(key.clone());
            continue;
        };

        let mut delete = |rec: &InterfaceRecord, at: &Endpoint| {
            if let Some(id) = cable_id(rec) {
                plan.delete.entry(id).or_insert_with(|| at.clone());
            }
        };

        // dangling: a cable with no peer we can name
        for (rec, at) in [(lcl, &key.a), (rmt, &key.b)] {
            if link_peer(rec).is_none() {
                delete(rec, at);
            }
        }

        match link_peer(lcl) {
            Some(peer) if peer == key.b => continue,
            Some(_) => {
                delete(lcl, &key.a);
                delete(rmt, &key.b);
            }
            None => {
                if link_peer(rmt).is_some_and(|peer| peer != key.a) {
                    delete(rmt, &key.b);
                }
            }
        }
        plan.create.insert(key.clone());
    }

    plan
}

/// Outcome of one cabling pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CablingSummary {
    pub deleted: usize,
    pub created: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub async fn sync_cabling<'a>(
    client: &NetboxClient,
    devices: impl IntoIterator<Item = &'a Device>,
    governed: &HashSet<String>,
) -> CablingSummary {
    tracing::info!("Checking cabling ...");

    let desired = desired_cables(devices, governed);
    let endpoints: BTreeSet<&Endpoint> = desired.iter().flat_map(|k| [&k.a, &k.b]).collect();

    tracing::info!("Fetching {} interface records, please be patient ...", endpoints.len());
    let fetched = join_all(endpoints.into_iter().map(|ep| async move {
        match fetch::fetch_interface(client, &ep.device, &ep.interface).await {
            Ok(Some(rec)) => Some((ep.clone(), rec)),
            Ok(None) => {
                tracing::error!("{}: interface missing in NetBox, skipping its cable", ep);
                None
            }
            Err(e) => {
                tracing::error!("{}: interface lookup failed, skipping its cable: {}", ep, e);
                None
            }
        }
    }))
    .await;
    let remote: HashMap<Endpoint, InterfaceRecord> = fetched.into_iter().flatten().collect();

    let plan = plan_cabling(&desired, &remote);
    let mut summary = CablingSummary {
        skipped: plan.skipped.len(),
        ..Default::default()
    };

    if plan.is_empty() {
        tracing::info!("No cable changes required.");
        return summary;
    }

    if !plan.delete.is_empty() {
        tracing::info!("Removing {} cables ...", plan.delete.len());
        let results = join_all(plan.delete.iter().map(|(id, at)| delete_cable(client, *id, at))).await;
        tally(&mut summary.deleted, &mut summary.failed, results);
    }

    if !plan.create.is_empty() {
        tracing::info!("Adding {} cables ...", plan.create.len());
        let results = join_all(plan.create.iter().filter_map(|key| {
            let a_id = remote.get(&key.a)?.id;
            let b_id = remote.get(&key.b)?.id;
            Some(create_cable(client, key, a_id, b_id))
        }))
        .await;
        tally(&mut summary.created, &mut summary.failed, results);
    }

    summary
}

fn tally(ok: &mut usize, failed: &mut usize, results: Vec<bool>) {
    for done in results {
        if done {
            *ok += 1;
        } else {
            *failed += 1;
        }
    }
}

async fn delete_cable(client: &NetboxClient, id: u64, at: &Endpoint) -> bool {
    match client.call("dcim_cables_delete", Args::new().id(id)).await {
        Ok(res) if !res.is_error() => {
            tracing::info!("{} cable removed OK", at);
            true
        }
        Ok(res) => {
            tracing::error!("{} failed to remove cable: {}", at, res.log_text());
            false
        }
        Err(e) => {
            tracing::error!("{} failed to remove cable: {}", at, e);
            false
        }
    }
}

async fn create_cable(client: &NetboxClient, key: &CableKey, a_id: u64, b_id: u64) -> bool {
    let body = json!({
        "a_terminations": [{ "object_type": "dcim.interface", "object_id": a_id }],
        "b_terminations": [{ "object_type": "dcim.interface", "object_id": b_id }],
    });

    match client.call("dcim_cables_create", Args::new().json(body)).await {
        Ok(res) if !res.is_error() => {
            tracing::info!("{} cabled {} OK", key.a, key.b);
            true
        }
        Ok(res) => {
            tracing::error!("{} cabling {} failed: {}", key.a, key.b, res.log_text());
            false
        }
        Err(e) => {
            tracing::error!("{} cabling {} failed: {}", key.a, key.b, e);
            false
        }
    }
}
