//! Error types for the NetBox client.

use thiserror::Error;

/// Result type alias for NetBox client operations.
pub type Result<T> = std::result::Result<T, NetboxError>;

/// Errors that can occur while talking to the NetBox REST API.
#[derive(Error, Debug)]
pub enum NetboxError {
    /// A required connection setting was not supplied and is not in the environment.
    #[error("Missing environment variable: {0}")]
    MissingConfig(&'static str),

    /// The operation identifier is not in the loaded API specification.
    #[error("Unknown operation-id: {0}")]
    UnknownOperation(String),

    /// A path parameter declared by the operation was not given by the caller.
    #[error("Operation {operation} requires path parameter '{param}'")]
    MissingPathParam { operation: String, param: String },

    /// A connection setting is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The API specification document could not be used.
    #[error("Invalid API specification: {0}")]
    InvalidSpec(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response that the caller asked to treat as an error.
    #[error("API error ({status}) at {url}: {body}")]
    Api { status: u16, url: String, body: String },

    /// Transient server errors persisted past the retry budget.
    #[error("Maximum retries exceeded ({attempts} attempts), last status {status}")]
    RetriesExhausted { attempts: usize, status: u16 },

    /// A referenced object does not exist in NetBox.
    #[error("NetBox missing {kind} {key}, please resolve.")]
    NotFound { kind: &'static str, key: String },

    /// The response body was not shaped as expected.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// The request concurrency gate was closed.
    #[error("Request gate closed")]
    GateClosed,
}

/// Which server responses the transport retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Only HTTP 500.
    #[default]
    InternalServerError,
    /// Any 5xx status.
    ServerErrors,
}

impl NetboxError {
    /// Check if an HTTP status code is retried under the given policy.
    ///
    /// 4xx responses are never retried; they go back to the caller as-is.
    pub fn is_retryable_status(status: u16, retry_on: RetryOn) -> bool {
        match retry_on {
            RetryOn::InternalServerError => status == 500,
            RetryOn::ServerErrors => (500..600).contains(&status),
        }
    }

    /// Check if this error reports a missing referenced object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_retries_only_500() {
        assert!(NetboxError::is_retryable_status(500, RetryOn::default()));
        assert!(!NetboxError::is_retryable_status(502, RetryOn::default()));
        assert!(!NetboxError::is_retryable_status(503, RetryOn::default()));
        assert!(!NetboxError::is_retryable_status(404, RetryOn::default()));
    }

    #[test]
    fn test_widened_policy_retries_all_5xx() {
        for status in [500, 502, 503, 504] {
            assert!(NetboxError::is_retryable_status(status, RetryOn::ServerErrors));
        }
        // Client errors (4xx) - never retried
        for status in [400, 401, 403, 404, 409, 429] {
            assert!(!NetboxError::is_retryable_status(status, RetryOn::ServerErrors));
        }
        assert!(!NetboxError::is_retryable_status(200, RetryOn::ServerErrors));
    }

    #[test]
    fn test_missing_config_names_variable() {
        let err = NetboxError::MissingConfig("NETBOX_TOKEN");
        assert_eq!(err.to_string(), "Missing environment variable: NETBOX_TOKEN");
    }

    #[test]
    fn test_not_found_message() {
        let err = NetboxError::NotFound {
            kind: "site",
            key: "hq".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "NetBox missing site hq, please resolve.");
    }

    #[test]
    fn test_unknown_operation_is_not_a_missing_object() {
        let err = NetboxError::UnknownOperation("dcim_widgets_list".to_string());
        assert!(!err.is_not_found());
    }
}
