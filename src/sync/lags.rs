//! LAG membership reconciliation
//!
//! Membership lives on the member interface (`lag` back-reference), so each
//! change is one PATCH on one member.

use super::interfaces::InterfaceMap;
use crate::design::Device;
use crate::netbox::{Args, NetboxClient};
use futures::future::join_all;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

pub type LagMembers = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LagChange {
    pub lag: String,
    pub add: BTreeSet<String>,
    pub remove: BTreeSet<String>,
}

pub fn expected_members(dev: &Device) -> LagMembers {
    dev.used_interfaces()
        .filter_map(|iface| {
            let profile = iface.profile.as_ref().filter(|p| p.is_lag())?;
            Some((iface.name.clone(), profile.lag_members().iter().cloned().collect()))
        })
        .collect()
}

pub fn observed_members(if_map: &InterfaceMap) -> LagMembers {
    let mut members = LagMembers::new();
    for rec in if_map.values() {
        if let Some(lag) = &rec.lag {
            members.entry(lag.name.clone()).or_default().insert(rec.name.clone());
        }
    }
    members
}

/// Membership changes for every LAG the design declares
pub fn plan_lags(expected: &LagMembers, observed: &LagMembers) -> Vec<LagChange> {
    let empty = BTreeSet::new();
    expected
        .iter()
        .filter_map(|(lag, want)| {
            let has = observed.get(lag).unwrap_or(&empty);
            if want == has {
                return None;
            }
            Some(LagChange {
                lag: lag.clone(),
                add: want.difference(has).cloned().collect(),
                remove: has.difference(want).cloned().collect(),
            })
        })
        .collect()
}

/// One PATCH on a member interface; `lag: None` clears its membership
#[derive(Debug, PartialEq, Eq)]
pub struct MemberUpdate {
    pub member: String,
    pub lag: Option<String>,
}

/// Order the changes as member writes: every removal first, then every add.
///
/// A member leaving one LAG for another is only written once, by the add.
pub fn member_updates(changes: &[LagChange]) -> Vec<MemberUpdate> {
    let claimed: BTreeSet<&String> = changes.iter().flat_map(|c| &c.add).collect();

    let removals = changes.iter().flat_map(|change| {
        change
            .remove
            .iter()
            .filter(|member| !claimed.contains(member))
            .map(|member| MemberUpdate {
                member: member.clone(),
                lag: None,
            })
    });
    let adds = changes.iter().flat_map(|change| {
        change.add.iter().map(|member| MemberUpdate {
            member: member.clone(),
            lag: Some(change.lag.clone()),
        })
    });
    removals.chain(adds).collect()
}

pub async fn sync_lags(client: &NetboxClient, dev: &Device, if_map: &InterfaceMap) {
    let mut changes = plan_lags(&expected_members(dev), &observed_members(if_map));

    for change in changes.iter_mut().filter(|c| !c.add.is_empty()) {
        if !if_map.contains_key(&change.lag) {
            tracing::error!("{}: LAG {} missing in NetBox, cannot add members", dev.name, change.lag);
            change.add.clear();
        }
    }

    let (removals, adds): (Vec<_>, Vec<_>) = member_updates(&changes).into_iter().partition(|u| u.lag.is_none());
    join_all(removals.iter().map(|u| set_lag(client, dev, if_map, u))).await;
    join_all(adds.iter().map(|u| set_lag(client, dev, if_map, u))).await;
}

async fn set_lag(client: &NetboxClient, dev: &Device, if_map: &InterfaceMap, update: &MemberUpdate) {
    let if_name = &update.member;
    let Some(rec) = if_map.get(if_name) else {
        tracing::error!("{}:{} missing in NetBox, failed LAG update", dev.name, if_name);
        return;
    };
    let (action, lag_name, lag) = match &update.lag {
        Some(name) => match if_map.get(name) {
            Some(lag_rec) => ("add to", name.as_str(), Value::from(lag_rec.id)),
            None => return,
        },
        None => ("remove from", rec.lag.as_ref().map_or("", |l| l.name.as_str()), Value::Null),
    };

    let args = Args::new().id(rec.id).json(json!({ "lag": lag }));
    match client.call("dcim_interfaces_partial_update", args).await {
        Ok(res) if !res.is_error() => {
            tracing::info!("{}:{} {} LAG {} OK", dev.name, if_name, action, lag_name);
        }
        Ok(res) => {
            tracing::error!("{}:{} failed {} LAG {}: {}", dev.name, if_name, action, lag_name, res.log_text());
        }
        Err(e) => {
            tracing::error!("{}:{} failed {} LAG {}: {}", dev.name, if_name, action, lag_name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plan_add_and_remove() {
        let mut expected = LagMembers::new();
        expected.insert("Po1".into(), set(&["eth1", "eth2"]));
        expected.insert("Po2".into(), set(&["eth5"]));
        let mut observed = LagMembers::new();
        observed.insert("Po1".into(), set(&["eth2", "eth3"]));
        observed.insert("Po2".into(), set(&["eth5"]));
        observed.insert("Po9".into(), set(&["eth9"]));

        let changes = plan_lags(&expected, &observed);
        assert_eq!(
            changes,
            vec![LagChange {
                lag: "Po1".into(),
                add: set(&["eth1"]),
                remove: set(&["eth3"]),
            }]
        );
    }

    #[test]
    fn test_plan_new_lag() {
        let mut expected = LagMembers::new();
        expected.insert("Po1".into(), set(&["eth1"]));
        let changes = plan_lags(&expected, &LagMembers::new());
        assert_eq!(changes[0].add, set(&["eth1"]));
        assert!(changes[0].remove.is_empty());
    }

    #[test]
    fn test_moved_member_is_written_once() {
        let mut expected = LagMembers::new();
        expected.insert("Po1".into(), set(&["eth1"]));
        expected.insert("Po2".into(), set(&["eth2"]));
        let mut observed = LagMembers::new();
        observed.insert("Po2".into(), set(&["eth1", "eth2"]));

        let updates = member_updates(&plan_lags(&expected, &observed));
        assert_eq!(
            updates,
            vec![MemberUpdate {
                member: "eth1".into(),
                lag: Some("Po1".into()),
            }]
        );
    }

    #[test]
    fn test_removals_precede_adds() {
        let changes = vec![
            LagChange {
                lag: "Po1".into(),
                add: set(&["eth1"]),
                remove: BTreeSet::new(),
            },
            LagChange {
                lag: "Po2".into(),
                add: BTreeSet::new(),
                remove: set(&["eth3"]),
            },
        ];
        let updates = member_updates(&changes);
        assert_eq!(updates[0], MemberUpdate { member: "eth3".into(), lag: None });
        assert_eq!(updates[1], MemberUpdate { member: "eth1".into(), lag: Some("Po1".into()) });
    }
}
