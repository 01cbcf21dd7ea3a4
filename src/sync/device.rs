//! Device record reconciliation
//!
//! A device is looked up by exact name. Absent devices are created with their
//! taxonomy references resolved by slug (device-type by model); present ones
//! are diffed against the design and patched once with every corrected field.

use crate::design::properties::DeviceField;
use crate::design::{Device, DeviceProperties};
use crate::netbox::records::{DeviceRecord, NestedRef};
use crate::netbox::{fetch, Args, NetboxClient, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Fields that never go into a device PATCH: product model is a catalog
/// property of the device-type and the primary IP has its own step
const UNPATCHED: [DeviceField; 2] = [DeviceField::ProductModel, DeviceField::PrimaryIp];

/// Create or update the NetBox record of `dev`
pub async fn sync_device(client: &NetboxClient, dev: &Device, desired: &DeviceProperties) -> Result<DeviceRecord> {
    match fetch::fetch_device_by_name(client, &dev.name).await? {
        None => create_device(client, dev, desired).await,
        Some(rec) => sync_existing_device(client, dev, desired, rec).await,
    }
}

async fn create_device(client: &NetboxClient, dev: &Device, desired: &DeviceProperties) -> Result<DeviceRecord> {
    tracing::info!("{}: Creating NetBox device record", dev.name);

    let (site, device_type, role, platform) = futures::try_join!(
        fetch::fetch_site(client, &desired.site),
        fetch::fetch_device_type(client, &desired.device_type),
        fetch::fetch_device_role(client, &desired.device_role),
        platform_id(client, &desired.platform),
    )?;

    let body = json!({
        "name": dev.name,
        "status": desired.status,
        "site": site.id,
        "device_type": device_type.id,
        "device_role": role.id,
        "platform": platform,
    });

    let res = client.call("dcim_devices_create", Args::new().json(body)).await?;
    if res.is_error() {
        tracing::error!("{}: Failed to create record in NetBox: {}", dev.name, res.log_text());
    }
    let rec: DeviceRecord = res.error_for_status()?.json()?;

    tracing::info!("{}: Created in NetBox OK.", dev.name);
    Ok(rec)
}

async fn platform_id(client: &NetboxClient, platform: &str) -> Result<Value> {
    if platform.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::from(fetch::fetch_platform(client, platform).await?.id))
}

/// Properties of an existing record, comparable with the design's
pub async fn observed_properties(client: &NetboxClient, rec: &DeviceRecord) -> Result<DeviceProperties> {
    let (device_type, product_model) = match &rec.device_type {
        Some(dt) => {
            let detail = fetch::fetch_device_type_detail(client, dt.id).await?;
            let model = if dt.model.is_empty() { dt.display.clone() } else { dt.model.clone() };
            (model, detail.part_number)
        }
        None => (String::new(), String::new()),
    };

    Ok(DeviceProperties {
        site: rec.site.as_ref().map(|s| s.slug.clone()).unwrap_or_default(),
        status: rec.status_value().to_string(),
        device_role: rec.role().map(|r| r.slug.clone()).unwrap_or_default(),
        device_type,
        platform: rec.platform.as_ref().map(|p| p.slug.clone()).unwrap_or_default(),
        product_model,
        primary_ip: rec.primary_address().to_string(),
    })
}

/// Mismatched fields that a PATCH can correct
pub fn patchable_fields(mismatch: &BTreeSet<DeviceField>) -> BTreeSet<DeviceField> {
    mismatch
        .iter()
        .filter(|f| !UNPATCHED.contains(*f))
        .copied()
        .collect()
}

/// Current reference ids of a record, the starting point of every PATCH
pub fn base_patch_body(rec: &DeviceRecord) -> Map<String, Value> {
    let id_of = |r: Option<&NestedRef>| r.map_or(Value::Null, |r| Value::from(r.id));
    let mut body = Map::new();
    body.insert("site".into(), id_of(rec.site.as_ref()));
    body.insert("device_type".into(), id_of(rec.device_type.as_ref()));
    body.insert("device_role".into(), id_of(rec.role()));
    body.insert("platform".into(), id_of(rec.platform.as_ref()));
    body
}

async fn sync_existing_device(
    client: &NetboxClient,
    dev: &Device,
    desired: &DeviceProperties,
    rec: DeviceRecord,
) -> Result<DeviceRecord> {
    tracing::info!("{}: Sync existing NetBox device record", dev.name);

    let observed = observed_properties(client, &rec).await?;
    let mismatch = desired - &observed;

    if mismatch.contains(&DeviceField::ProductModel) {
        tracing::warn!(
            "{}: device-type \"{}\" matches, but not product-model \"{}\", check NetBox.",
            dev.name,
            desired.device_type,
            desired.product_model
        );
    }

    let fields = patchable_fields(&mismatch);
    if fields.is_empty() {
        tracing::info!("{}: NetBox is correct, no further action.", dev.name);
        return Ok(rec);
    }

    let names: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
    tracing::info!("{}: need to update {}", dev.name, names.join(", "));

    let mut body = base_patch_body(&rec);
    for field in &fields {
        let value = match field {
            DeviceField::Site => Value::from(fetch::fetch_site(client, &desired.site).await?.id),
            DeviceField::DeviceType => {
                Value::from(fetch::fetch_device_type(client, &desired.device_type).await?.id)
            }
            DeviceField::DeviceRole => {
                Value::from(fetch::fetch_device_role(client, &desired.device_role).await?.id)
            }
            DeviceField::Platform => platform_id(client, &desired.platform).await?,
            DeviceField::Status => Value::from(desired.status.clone()),
            DeviceField::ProductModel | DeviceField::PrimaryIp => continue,
        };
        body.insert(field.as_str().to_string(), value);
    }

    let res = client
        .call("dcim_devices_partial_update", Args::new().id(rec.id).json(Value::Object(body)))
        .await?;
    if res.is_error() {
        tracing::error!("{}: NetBox device record update failed: {}", dev.name, res.log_text());
    }
    let updated: DeviceRecord = res.error_for_status()?.json()?;

    tracing::info!("{}: NetBox device record update OK.", dev.name);
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DeviceRecord {
        serde_json::from_value(json!({
            "id": 7,
            "name": "r1",
            "status": {"value": "planned", "label": "Planned"},
            "site": {"id": 1, "slug": "hq"},
            "device_type": {"id": 2, "model": "CSR1000V"},
            "device_role": {"id": 3, "slug": "edge"},
            "platform": null,
            "primary_ip": null
        }))
        .unwrap()
    }

    #[test]
    fn test_patchable_fields_drop_catalog_and_primary_ip() {
        let mismatch: BTreeSet<_> = [DeviceField::Status, DeviceField::ProductModel, DeviceField::PrimaryIp]
            .into_iter()
            .collect();
        assert_eq!(patchable_fields(&mismatch), [DeviceField::Status].into_iter().collect::<BTreeSet<_>>());
    }

    #[test]
    fn test_base_patch_body_carries_reference_ids() {
        let body = base_patch_body(&record());
        assert_eq!(body["site"], json!(1));
        assert_eq!(body["device_type"], json!(2));
        assert_eq!(body["device_role"], json!(3));
        assert_eq!(body["platform"], Value::Null);
        assert!(!body.contains_key("name"));
    }
}
