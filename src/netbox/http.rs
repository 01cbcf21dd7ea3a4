//! HTTP transport for NetBox REST API calls
//!
//! Every request goes through a process-wide concurrency gate and a bounded
//! exponential-backoff retry loop for transient server errors.

use super::error::{NetboxError, Result, RetryOn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Maximum length of response body to log (to avoid flooding the log with HTML error pages)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Default number of concurrent in-flight requests
pub const DEFAULT_MAX_CONCURRENCY: usize = 100;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_LOG_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... [truncated, {} bytes total]", &body[..cut], body.len()),
        None => body.to_string(),
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Bounded exponential backoff applied to transient failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: usize,
    /// Lower bound of the wait between attempts
    pub min_wait: Duration,
    /// Upper bound of the wait between attempts
    pub max_wait: Duration,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(10),
            retry_on: RetryOn::InternalServerError,
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt, after `attempt` (1-based) has failed.
    /// Doubles from one second and is clamped to `[min_wait, max_wait]`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as u32;
        let raw = Duration::from_secs(1u64 << exp);
        raw.max(self.min_wait).min(self.max_wait.max(self.min_wait))
    }
}

/// Settings needed to construct the transport
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// API root, e.g. `https://netbox.example.com/api`
    pub api_url: String,
    pub token: String,
    pub timeout: Duration,
    pub max_concurrency: usize,
    pub verify_tls: bool,
    pub retry: RetryPolicy,
}

/// A response that made it back from NetBox, successful or not.
///
/// 4xx (and non-retried 5xx) responses are returned here rather than as
/// errors so that callers can log the body and carry on with sibling work.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub url: String,
    body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    /// Body trimmed down for log lines
    pub fn log_text(&self) -> String {
        sanitize_for_log(&self.body)
    }

    /// Decode the body; an empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body)
            .map_err(|e| NetboxError::InvalidResponse(format!("{} from {}", e, self.url)))
    }

    /// Turn a non-success response into `NetboxError::Api`
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_error() {
            return Err(NetboxError::Api {
                status: self.status.as_u16(),
                url: self.url,
                body: sanitize_for_log(&self.body),
            });
        }
        Ok(self)
    }
}

/// Rate-limited, retrying HTTP client for the NetBox API
#[derive(Clone)]
pub struct NetboxHttpClient {
    client: Client,
    api_url: String,
    gate: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl NetboxHttpClient {
    /// Create a new HTTP client with the token installed as a default header
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        url::Url::parse(&settings.api_url)
            .map_err(|e| NetboxError::InvalidConfig(format!("{}: {}", settings.api_url, e)))?;

        let mut auth = HeaderValue::from_str(&format!("Token {}", settings.token))
            .map_err(|_| NetboxError::InvalidConfig("API token is not a valid header value".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .user_agent(concat!("nbsync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()?;

        Ok(Self {
            client,
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            gate: Arc::new(Semaphore::new(settings.max_concurrency.max(1))),
            retry: settings.retry.clone(),
        })
    }

    /// Number of requests that could start right now without waiting
    pub fn available_permits(&self) -> usize {
        self.gate.available_permits()
    }

    /// Issue one request. The gate permit is held across every retry attempt
    /// and released when this returns, successfully or not.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.api_url, path);
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| NetboxError::GateClosed)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            tracing::debug!("{} {} (attempt {})", method, url, attempt);

            let mut request = self.client.request(method.clone(), &url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let final_url = response.url().to_string();
                    let text = response.text().await?;

                    if !NetboxError::is_retryable_status(status.as_u16(), self.retry.retry_on) {
                        return Ok(ApiResponse::new(status, final_url, text));
                    }

                    if attempt >= self.retry.attempts {
                        tracing::error!("NetBox API error: {} - {}", status, sanitize_for_log(&text));
                        return Err(NetboxError::RetriesExhausted {
                            attempts: attempt,
                            status: status.as_u16(),
                        });
                    }

                    tracing::warn!(
                        "NetBox API error: {} - {}, retrying",
                        status,
                        sanitize_for_log(&text)
                    );
                }
                Err(err) => {
                    let transient = err.is_timeout() || err.is_connect();
                    if !transient || attempt >= self.retry.attempts {
                        return Err(err.into());
                    }
                    tracing::warn!("{} {} failed: {}, retrying", method, url, err);
                }
            }

            tokio::time::sleep(self.retry.backoff(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.ends_with("... [truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_handles_multibyte_boundaries() {
        let body = "é".repeat(300);
        // must not panic on a char boundary
        let _ = sanitize_for_log(&body);
    }

    #[test]
    fn test_backoff_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
        assert_eq!(policy.backoff(60), Duration::from_secs(10));
    }

    #[test]
    fn test_api_response_empty_body_is_null() {
        let res = ApiResponse::new(StatusCode::NO_CONTENT, "http://nb/api/dcim/cables/1/", "");
        let value: Value = res.json().unwrap();
        assert!(value.is_null());
        assert!(!res.is_error());
    }

    #[test]
    fn test_error_for_status() {
        let res = ApiResponse::new(StatusCode::BAD_REQUEST, "http://nb/api/x/", "{\"name\":[\"bad\"]}");
        assert!(res.is_error());
        match res.error_for_status() {
            Err(NetboxError::Api { status, .. }) => assert_eq!(status, 400),
            other => panic!("unexpected: {:?}", other.map(|r| r.status)),
        }
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let settings = TransportSettings {
            api_url: "not a url".into(),
            token: "t".into(),
            timeout: DEFAULT_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            verify_tls: true,
            retry: RetryPolicy::default(),
        };
        assert!(matches!(
            NetboxHttpClient::new(&settings),
            Err(NetboxError::InvalidConfig(_))
        ));
    }
}
