//! Error types for colony-client

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single reason reported by the Colony API in an error body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEntry {
    pub name: String,
    pub message: String,
}

/// Remote failure: a 4xx/5xx response and the reasons it carried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code of the response
    pub status: u16,
    /// Reasons in the order the server listed them
    pub errors: Vec<ApiErrorEntry>,
}

impl ApiError {
    /// Concatenate the reasons into a single human-readable message
    pub fn message(&self) -> String {
        if self.errors.is_empty() {
            return format!("request failed with HTTP status {}", self.status);
        }

        self.errors
            .iter()
            .map(|err| format!("{}: {}", err.name, err.message))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Errors that can occur while talking to the Colony API
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Missing or unusable client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP verb outside GET/POST/PUT/DELETE
    #[error("Method must be in [GET, POST, PUT, DELETE], got {0}")]
    InvalidMethod(String),

    /// Remote service answered with status >= 400
    #[error("{0}")]
    Api(ApiError),

    /// Response body lacks an expected field
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Poll budget exhausted before the sandbox became active
    #[error("Sandbox {id} was not active after the provided timeout of {minutes} minutes")]
    Timeout { id: String, minutes: u64 },

    /// Remote reports a status other than Launching or Active
    #[error("Launching failed. The state of Sandbox {id} is: {status}")]
    TerminalFailure { id: String, status: String },

    /// Invalid user-supplied parameter
    #[error("Invalid parameter: {0}")]
    Validation(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for SandboxError {
    fn from(err: reqwest::Error) -> Self {
        SandboxError::Http(err.to_string())
    }
}

impl From<ApiError> for SandboxError {
    fn from(err: ApiError) -> Self {
        SandboxError::Api(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, message: &str) -> ApiErrorEntry {
        ApiErrorEntry {
            name: name.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_api_error_joins_reasons_in_order() {
        let err = ApiError {
            status: 400,
            errors: vec![entry("a", "first"), entry("b", "second")],
        };
        assert_eq!(err.message(), "a: first;b: second");
    }

    #[test]
    fn test_api_error_without_reasons_names_status() {
        let err = ApiError {
            status: 503,
            errors: vec![],
        };
        assert_eq!(
            SandboxError::from(err).to_string(),
            "request failed with HTTP status 503"
        );
    }
}
