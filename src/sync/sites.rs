//! Site ensure-exists
//!
//! Sites are the one taxonomy object a push creates on its own. Existing
//! sites are never modified.

use crate::design::SiteProperties;
use crate::netbox::records::ObjectRecord;
use crate::netbox::{fetch, Args, NetboxClient};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Create every site in `sites` that NetBox does not have; returns the
/// number created
pub async fn ensure_sites(client: &NetboxClient, sites: &BTreeSet<SiteProperties>) -> usize {
    let checks = join_all(sites.iter().map(|site| async move {
        let mut params = Map::new();
        params.insert("slug".into(), Value::from(site.slug.clone()));
        match fetch::fetch_first::<ObjectRecord>(client, "dcim_sites_list", params).await {
            Ok(found) => Some((site, found.is_some())),
            Err(e) => {
                tracing::error!("Unable to check site '{}': {}", site.slug, e);
                None
            }
        }
    }))
    .await;

    let missing = missing_sites(checks);

    let mut created = 0;
    for site in missing {
        if create_site(client, site).await {
            created += 1;
        }
    }
    created
}

/// Sites whose existence check succeeded and found nothing; failed checks
/// are skipped
fn missing_sites(checks: Vec<Option<(&SiteProperties, bool)>>) -> Vec<&SiteProperties> {
    checks
        .into_iter()
        .flatten()
        .filter(|(_, exists)| !exists)
        .map(|(site, _)| site)
        .collect()
}

async fn site_group_id(client: &NetboxClient, site: &SiteProperties) -> Value {
    let Some(group) = &site.group else {
        return Value::Null;
    };
    match fetch::fetch_site_group(client, group).await {
        Ok(Some(rec)) => Value::from(rec.id),
        Ok(None) => {
            tracing::warn!(
                "site-group={} for site={} does not exist, skipping field, but adding site",
                group,
                site.slug
            );
            Value::Null
        }
        Err(e) => {
            tracing::warn!("site-group={} lookup for site={} failed: {}", group, site.slug, e);
            Value::Null
        }
    }
}

/// Create body for `site`; `group` is the site-group id or null
pub fn site_body(site: &SiteProperties, group: Value) -> Value {
    json!({
        "name": site.name,
        "slug": site.slug,
        "description": site.description,
        "group": group,
    })
}

async fn create_site(client: &NetboxClient, site: &SiteProperties) -> bool {
    let group = site_group_id(client, site).await;
    let body = site_body(site, group);

    match client.call("dcim_sites_create", Args::new().json(body)).await {
        Ok(res) if !res.is_error() => {
            tracing::info!("Site '{}' created", site.name);
            true
        }
        Ok(res) => {
            tracing::error!("Unable to create site '{}': {}", site.slug, res.log_text());
            false
        }
        Err(e) => {
            tracing::error!("Unable to create site '{}': {}", site.slug, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_body_defaults_name_from_slug() {
        let site = SiteProperties::from_slug("lab1");
        let body = site_body(&site, Value::Null);
        assert_eq!(
            body,
            json!({"name": "LAB1", "slug": "lab1", "description": "", "group": null})
        );
    }

    #[test]
    fn test_site_body_carries_group_id() {
        let mut site = SiteProperties::from_slug("lab1");
        site.group = Some("east".into());
        site.description = "east lab".into();
        let body = site_body(&site, Value::from(4));
        assert_eq!(body["group"], json!(4));
        assert_eq!(body["description"], json!("east lab"));
    }

    #[test]
    fn test_failed_checks_are_not_created() {
        let hq = SiteProperties::from_slug("hq");
        let lab = SiteProperties::from_slug("lab");
        let dc = SiteProperties::from_slug("dc");
        let missing = missing_sites(vec![Some((&hq, true)), Some((&lab, false)), None, Some((&dc, false))]);
        assert_eq!(missing, vec![&lab, &dc]);
    }
}
