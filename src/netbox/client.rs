//! NetBox Client
//!
//! Main client for interacting with the NetBox API, combining the operation
//! table with the rate-limited HTTP transport. Endpoints are addressed by
//! operation identifier:
//!
//! ```ignore
//! client.call("dcim_devices_list", Args::new().param("site", "hq")).await?;
//! client.call("dcim_cables_delete", Args::new().id(123)).await?;
//! client.call("dcim_cables_create", Args::new().json(body)).await?;
//! ```

use super::error::{NetboxError, Result};
use super::http::{ApiResponse, NetboxHttpClient, TransportSettings};
use super::openapi::{param_to_string, Operation, OperationTable};
use super::pager::{Pager, DEFAULT_PAGE_SIZE};
use crate::config::Config;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Arguments for one operation call
///
/// Keyword values that match a declared path parameter are substituted into
/// the URL; any others are sent as query parameters together with `params`.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Map<String, Value>,
    params: Map<String, Value>,
    json: Option<Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keyword argument (path parameter or extra query parameter)
    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Shorthand for the `id` path parameter of detail endpoints
    pub fn id(self, id: u64) -> Self {
        self.arg("id", id)
    }

    /// Single query parameter; array values repeat the key
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Replace the query parameters
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Request body
    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn query_params(&self) -> &Map<String, Value> {
        &self.params
    }
}

/// Flatten a parameter map into query pairs; arrays repeat the key, `null` is dropped.
pub fn query_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                pairs.extend(
                    items
                        .iter()
                        .filter_map(param_to_string)
                        .map(|v| (key.clone(), v)),
                );
            }
            other => {
                if let Some(v) = param_to_string(other) {
                    pairs.push((key.clone(), v));
                }
            }
        }
    }
    pairs
}

/// Main NetBox client
#[derive(Clone)]
pub struct NetboxClient {
    pub http: NetboxHttpClient,
    operations: Arc<OperationTable>,
    page_size: usize,
}

impl NetboxClient {
    /// Create a client from resolved transport settings and an operation table
    pub fn new(settings: &TransportSettings, operations: OperationTable, page_size: usize) -> Result<Self> {
        Ok(Self {
            http: NetboxHttpClient::new(settings)?,
            operations: Arc::new(operations),
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
        })
    }

    /// Create a client from configuration, falling back to `NETBOX_ADDR` /
    /// `NETBOX_TOKEN` for anything not set explicitly.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.transport_settings()?;
        let operations = match &config.openapi_spec {
            Some(path) => OperationTable::from_file(path)?,
            None => OperationTable::embedded()?,
        };
        Self::new(&settings, operations, config.page_size)
    }

    /// Bind an operation by identifier
    pub fn op(&self, operation_id: &str) -> Result<OperationCaller<'_>> {
        let operation = self.operations.resolve(operation_id)?;
        Ok(OperationCaller {
            client: self,
            operation_id: operation_id.replace('-', "_"),
            operation,
        })
    }

    /// Resolve and invoke an operation in one step
    pub async fn call(&self, operation_id: &str, args: Args) -> Result<ApiResponse> {
        self.op(operation_id)?.call(args).await
    }

    /// Paging engine over a list-style operation
    pub fn pager(&self, operation_id: &str) -> Result<Pager<'_>> {
        Ok(Pager::new(self.op(operation_id)?, self.page_size))
    }

    /// Parse a CLI query filter of the form `keyword:value[,keyword:value,...]`
    pub fn parse_qfilter(expr: &str) -> Result<Map<String, Value>> {
        let mut params = Map::new();
        for item in expr.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = item.split_once(':').ok_or_else(|| {
                NetboxError::InvalidConfig(format!("filter '{}' is not keyword:value", item))
            })?;
            params.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
        }
        Ok(params)
    }

    /// The `results` list of a collection response body
    pub fn response_items(body: &Value) -> Result<Vec<Value>> {
        body.get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .ok_or_else(|| NetboxError::InvalidResponse("missing 'results' list".into()))
    }
}

/// An operation bound to a client, ready to be called
#[derive(Clone)]
pub struct OperationCaller<'a> {
    client: &'a NetboxClient,
    operation_id: String,
    operation: &'a Operation,
}

impl<'a> OperationCaller<'a> {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Issue the request. No retries here; the transport owns that policy.
    pub async fn call(&self, args: Args) -> Result<ApiResponse> {
        let Args {
            mut values,
            params,
            json,
        } = args;

        let path = self.operation.render_path(&self.operation_id, &mut values)?;

        let mut query = query_pairs(&values);
        query.extend(query_pairs(&params));

        self.client
            .http
            .request(self.operation.method.clone(), &path, &query, json.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_expand_arrays() {
        let mut params = Map::new();
        params.insert("name".into(), json!(["r1", "r2"]));
        params.insert("limit".into(), json!(1000));
        params.insert("site".into(), Value::Null);

        let pairs = query_pairs(&params);
        assert_eq!(
            pairs,
            vec![
                ("limit".to_string(), "1000".to_string()),
                ("name".to_string(), "r1".to_string()),
                ("name".to_string(), "r2".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_qfilter() {
        let params = NetboxClient::parse_qfilter("site:hq, role:edge,tag:a:b").unwrap();
        assert_eq!(params["site"], "hq");
        assert_eq!(params["role"], "edge");
        assert_eq!(params["tag"], "a:b");
        assert!(NetboxClient::parse_qfilter("nocolon").is_err());
        assert!(NetboxClient::parse_qfilter("").unwrap().is_empty());
    }

    #[test]
    fn test_response_items() {
        let body = json!({"count": 2, "results": [{"id": 1}, {"id": 2}]});
        assert_eq!(NetboxClient::response_items(&body).unwrap().len(), 2);
        assert!(NetboxClient::response_items(&json!({"id": 1})).is_err());
    }
}
