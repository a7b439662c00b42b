//! Colony sandbox API client
//!
//! Authenticated JSON calls against `/api/spaces/{space}/sandbox`.
//! Every non-2xx answer is turned into an [`ApiError`].

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiErrorEntry, SandboxError};
use crate::model::{CreatedSandbox, Sandbox, SandboxId, SandboxRequest};
use crate::schema::unknown_format;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_CHARSET, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Sandbox operations, as seen by the poller and the CLI
#[async_trait]
pub trait SandboxApi: Send + Sync {
    /// Create a sandbox and return its identifier
    async fn start(&self, request: &SandboxRequest) -> Result<SandboxId>;

    /// Fetch current status and progress
    async fn get(&self, id: &SandboxId) -> Result<Sandbox>;

    /// Release the sandbox
    async fn end(&self, id: &SandboxId) -> Result<()>;
}

/// HTTP verbs the API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl FromStr for ApiMethod {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(ApiMethod::Get),
            "POST" => Ok(ApiMethod::Post),
            "PUT" => Ok(ApiMethod::Put),
            "DELETE" => Ok(ApiMethod::Delete),
            _ => Err(SandboxError::InvalidMethod(s.to_string())),
        }
    }
}

impl From<ApiMethod> for reqwest::Method {
    fn from(method: ApiMethod) -> Self {
        match method {
            ApiMethod::Get => reqwest::Method::GET,
            ApiMethod::Post => reqwest::Method::POST,
            ApiMethod::Put => reqwest::Method::PUT,
            ApiMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
}

/// Colony API client
pub struct ColonyClient {
    config: ClientConfig,
    base_api_url: String,
    http_client: reqwest::Client,
}

impl ColonyClient {
    /// Create a new client
    ///
    /// Fails with [`SandboxError::Config`] when space or token is missing;
    /// nothing is sent over the network.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token.trim()))
            .map_err(|_| {
                SandboxError::Config("Token contains characters not allowed in a header".into())
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_CHARSET, HeaderValue::from_static("utf-8"));
        headers.insert(AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("colony-sandbox/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        let base_api_url = config.base_api_url();
        debug!(%base_api_url, "Colony client ready");

        Ok(ColonyClient {
            config,
            base_api_url,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request to `{base_api_url}/{endpoint}`
    ///
    /// GET params go to the query string, other verbs send them as the
    /// JSON body. The method is checked before anything is sent.
    pub async fn request(
        &self,
        method: &str,
        endpoint: &str,
        params: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let method: ApiMethod = method.parse()?;
        let url = format!("{}/{}", self.base_api_url, endpoint);
        debug!(?method, %url, "Colony API request");

        let mut builder = self.http_client.request(method.into(), &url);
        if let Some(params) = params {
            builder = match method {
                ApiMethod::Get => builder.query(params),
                _ => builder.json(params),
            };
        }

        let response = builder.send().await?;
        let status = response.status();

        if status.as_u16() >= 400 {
            let text = response.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            let err = ApiError {
                status: status.as_u16(),
                errors: body.errors,
            };
            warn!(status = status.as_u16(), %url, "Colony API error: {}", err);
            return Err(err.into());
        }

        Ok(response)
    }

    /// Start a sandbox from a blueprint
    pub async fn start_sandbox(&self, request: &SandboxRequest) -> Result<SandboxId> {
        let body = serde_json::to_value(request.to_body())?;
        let response = self.request("POST", "sandbox", Some(&body)).await?;

        let body = read_json(response).await?;
        let created: CreatedSandbox =
            serde_json::from_value(body.clone()).map_err(|_| unknown_format(&body))?;
        let id = created
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                SandboxError::MalformedResponse("creation response has no sandbox id".to_string())
            })?;

        info!(
            sandbox_id = %id,
            blueprint = request.blueprint_name(),
            "Sandbox started"
        );
        Ok(SandboxId::new(id))
    }

    /// Fetch a sandbox, decoded with the configured response layout
    pub async fn get_sandbox(&self, id: &SandboxId) -> Result<Sandbox> {
        let response = self.request("GET", &format!("sandbox/{}", id), None).await?;
        let body = read_json(response).await?;
        self.config.schema.decode(id, body)
    }

    /// End a sandbox
    pub async fn end_sandbox(&self, id: &SandboxId) -> Result<()> {
        self.request("DELETE", &format!("sandbox/{}", id), None)
            .await?;
        info!(sandbox_id = %id, "Sandbox ended");
        Ok(())
    }
}

/// Success bodies that are not JSON are malformed, not transport failures
async fn read_json(response: reqwest::Response) -> Result<Value> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|_| unknown_format(&text))
}

#[async_trait]
impl SandboxApi for ColonyClient {
    async fn start(&self, request: &SandboxRequest) -> Result<SandboxId> {
        self.start_sandbox(request).await
    }

    async fn get(&self, id: &SandboxId) -> Result<Sandbox> {
        self.get_sandbox(id).await
    }

    async fn end(&self, id: &SandboxId) -> Result<()> {
        self.end_sandbox(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("get".parse::<ApiMethod>().unwrap(), ApiMethod::Get);
        assert_eq!("Delete".parse::<ApiMethod>().unwrap(), ApiMethod::Delete);
        assert!(matches!(
            "PATCH".parse::<ApiMethod>(),
            Err(SandboxError::InvalidMethod(m)) if m == "PATCH"
        ));
    }

    #[test]
    fn test_new_with_empty_token_fails() {
        let err = ColonyClient::new(ClientConfig::new("dev", "")).err().unwrap();
        assert!(matches!(err, SandboxError::Config(_)));
    }

    #[test]
    fn test_new_with_empty_space_fails() {
        let err = ColonyClient::new(ClientConfig::new("", "token")).err().unwrap();
        assert!(matches!(err, SandboxError::Config(_)));
    }

    #[test]
    fn test_new_rejects_token_with_newline() {
        let err = ColonyClient::new(ClientConfig::new("dev", "abc\ndef"))
            .err()
            .unwrap();
        assert!(matches!(err, SandboxError::Config(_)));
    }

    #[tokio::test]
    async fn test_invalid_method_fails_before_network() {
        // TEST-NET address; a send would fail with Http instead
        let client =
            ColonyClient::new(ClientConfig::new("dev", "t").with_api_root("http://192.0.2.1:9"))
                .unwrap();
        let err = client.request("PATCH", "sandbox", None).await.unwrap_err();
        assert!(matches!(err, SandboxError::InvalidMethod(_)));
    }
}
