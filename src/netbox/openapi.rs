//! Operation table - load NetBox operations from an OpenAPI document
//!
//! Every path/verb pair carrying an `operationId` is registered under that
//! identifier (with `-` replaced by `_`), so callers can address endpoints
//! by name instead of by URL.

use super::error::{NetboxError, Result};
use reqwest::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// OpenAPI document covering the NetBox endpoints this tool uses (compiled into the binary)
const EMBEDDED_SPEC: &str = include_str!("../resources/netbox_openapi.json");

/// Keys under a path item that are HTTP verbs
const HTTP_VERBS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// One documented endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub method: Method,
    /// Path template, e.g. `/dcim/devices/{id}/`
    pub path: String,
    /// Parameters declared `in: path`, operation-level and path-level
    pub path_params: Vec<String>,
}

impl Operation {
    /// Substitute the path parameters, removing them from `args`.
    pub fn render_path(&self, operation_id: &str, args: &mut Map<String, Value>) -> Result<String> {
        let mut path = self.path.clone();
        for name in &self.path_params {
            let value = args
                .remove(name)
                .and_then(|v| param_to_string(&v))
                .ok_or_else(|| NetboxError::MissingPathParam {
                    operation: operation_id.to_string(),
                    param: name.clone(),
                })?;
            path = path.replace(&format!("{{{}}}", name), &value);
        }
        Ok(path)
    }
}

/// Immutable map of operation-id to endpoint
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    operations: HashMap<String, Operation>,
}

impl OperationTable {
    /// Build the table from a parsed document with a `paths` section
    pub fn load(spec: &Value) -> Result<Self> {
        let paths = spec
            .get("paths")
            .and_then(|v| v.as_object())
            .ok_or_else(|| NetboxError::InvalidSpec("missing 'paths' section".into()))?;

        let mut operations = HashMap::new();

        for (api_path, path_item) in paths {
            let Some(path_item) = path_item.as_object() else {
                continue;
            };
            let shared_params = declared_path_params(path_item.get("parameters"));

            for (verb, body) in path_item {
                if !HTTP_VERBS.contains(&verb.as_str()) || !body.is_object() {
                    continue;
                }
                let Some(operation_id) = body.get("operationId").and_then(|v| v.as_str()) else {
                    continue;
                };

                let method = Method::from_bytes(verb.to_uppercase().as_bytes())
                    .map_err(|e| NetboxError::InvalidSpec(format!("{}: {}", verb, e)))?;

                let mut path_params = declared_path_params(body.get("parameters"));
                for name in &shared_params {
                    if !path_params.contains(name) {
                        path_params.push(name.clone());
                    }
                }

                operations.insert(
                    normalize_id(operation_id),
                    Operation {
                        method,
                        path: api_path.clone(),
                        path_params,
                    },
                );
            }
        }

        tracing::debug!("Loaded {} API operations", operations.len());
        Ok(Self { operations })
    }

    /// Parse and load a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let spec: Value = serde_json::from_str(text)
            .map_err(|e| NetboxError::InvalidSpec(format!("not valid JSON: {}", e)))?;
        Self::load(&spec)
    }

    /// Load from a JSON file on disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| NetboxError::InvalidSpec(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// The table built from the embedded document
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_SPEC)
    }

    /// Look up an operation by identifier
    pub fn resolve(&self, operation_id: &str) -> Result<&Operation> {
        self.operations
            .get(&normalize_id(operation_id))
            .ok_or_else(|| NetboxError::UnknownOperation(operation_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// All registered identifiers (sorted)
    pub fn operation_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.operations.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

fn normalize_id(operation_id: &str) -> String {
    operation_id.replace('-', "_")
}

fn declared_path_params(params: Option<&Value>) -> Vec<String> {
    params
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter(|p| p.get("in").and_then(|v| v.as_str()) == Some("path"))
                .filter_map(|p| p.get("name").and_then(|v| v.as_str()))
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Render a scalar argument as it appears in a URL; `null` and containers yield `None`.
pub(crate) fn param_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_spec() -> Value {
        json!({
            "paths": {
                "/dcim/cables/": {
                    "get": {"operationId": "dcim_cables_list"},
                    "post": {"operationId": "dcim-cables-create"}
                },
                "/dcim/cables/{id}/": {
                    "parameters": [{"name": "id", "in": "path", "required": true}],
                    "delete": {"operationId": "dcim_cables_delete"},
                    "summary": "not a verb"
                },
                "/things/{thing}/parts/{part}/": {
                    "get": {
                        "operationId": "things_parts_read",
                        "parameters": [
                            {"name": "thing", "in": "path"},
                            {"name": "part", "in": "path"},
                            {"name": "brief", "in": "query"}
                        ]
                    },
                    "put": {"summary": "no operation id"}
                }
            }
        })
    }

    #[test]
    fn test_load_registers_every_operation() {
        let table = OperationTable::load(&sample_spec()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(
            table.operation_ids(),
            vec!["dcim_cables_create", "dcim_cables_delete", "dcim_cables_list", "things_parts_read"]
        );
    }

    #[test]
    fn test_resolve_returns_declared_method_and_path() {
        let table = OperationTable::load(&sample_spec()).unwrap();
        let op = table.resolve("dcim_cables_delete").unwrap();
        assert_eq!(op.method, Method::DELETE);
        assert_eq!(op.path, "/dcim/cables/{id}/");
        assert_eq!(op.path_params, vec!["id".to_string()]);

        let op = table.resolve("dcim_cables_create").unwrap();
        assert_eq!(op.method, Method::POST);
        assert_eq!(op.path, "/dcim/cables/");
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let table = OperationTable::load(&sample_spec()).unwrap();
        assert!(matches!(
            table.resolve("dcim_racks_list"),
            Err(NetboxError::UnknownOperation(_))
        ));
    }

    #[test]
    fn test_render_path_consumes_path_args() {
        let table = OperationTable::load(&sample_spec()).unwrap();
        let op = table.resolve("things_parts_read").unwrap();

        let mut args = Map::new();
        args.insert("thing".into(), json!("t1"));
        args.insert("part".into(), json!(42));
        args.insert("brief".into(), json!(true));

        let path = op.render_path("things_parts_read", &mut args).unwrap();
        assert_eq!(path, "/things/t1/parts/42/");
        assert_eq!(args.len(), 1);
        assert!(args.contains_key("brief"));
    }

    #[test]
    fn test_render_path_missing_param() {
        let table = OperationTable::load(&sample_spec()).unwrap();
        let op = table.resolve("dcim_cables_delete").unwrap();
        let mut args = Map::new();
        assert!(matches!(
            op.render_path("dcim_cables_delete", &mut args),
            Err(NetboxError::MissingPathParam { .. })
        ));
    }

    #[test]
    fn test_spec_without_paths_is_rejected() {
        assert!(matches!(
            OperationTable::load(&json!({"swagger": "2.0"})),
            Err(NetboxError::InvalidSpec(_))
        ));
    }

    #[test]
    fn test_embedded_spec_has_sync_operations() {
        let table = OperationTable::embedded().unwrap();
        for id in [
            "dcim_devices_list",
            "dcim_devices_create",
            "dcim_devices_partial_update",
            "dcim_device_types_read",
            "dcim_interfaces_partial_update",
            "dcim_cables_delete",
            "ipam_ip_addresses_create",
            "dcim_site_groups_list",
        ] {
            assert!(table.resolve(id).is_ok(), "missing {}", id);
        }
    }
}
