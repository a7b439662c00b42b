//! Client configuration
//!
//! Everything the client needs to reach the API: host, space, bearer token
//! and the response layout. Values come from the caller or from `COLONY_*`
//! environment variables.

use crate::error::SandboxError;
use crate::model::SandboxId;
use crate::schema::ResponseSchema;
use crate::Result;
use std::time::Duration;

/// Public Colony host
pub const DEFAULT_HOST: &str = "cloudshellcolony.com";

/// Upper bound for a single HTTP call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_HOST: &str = "COLONY_HOST";
pub const ENV_SPACE: &str = "COLONY_SPACE";
pub const ENV_TOKEN: &str = "COLONY_TOKEN";
pub const ENV_ACCOUNT: &str = "COLONY_ACCOUNT";
pub const ENV_RESPONSE_SCHEMA: &str = "COLONY_RESPONSE_SCHEMA";
pub const ENV_API_ROOT: &str = "COLONY_API_ROOT";

/// Colony client configuration
#[derive(Clone)]
pub struct ClientConfig {
    /// API host name, without scheme
    pub host: String,
    /// Overrides `https://{host}` as the API root (used against local servers)
    pub api_root: Option<String>,
    /// Space the sandboxes live in
    pub space: String,
    /// Bearer token
    pub token: String,
    /// Account name, only needed to build sandbox web URLs
    pub account: Option<String>,
    pub request_timeout: Duration,
    pub schema: ResponseSchema,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("api_root", &self.api_root)
            .field("space", &self.space)
            .field("token", &"<redacted>")
            .field("account", &self.account)
            .field("request_timeout", &self.request_timeout)
            .field("schema", &self.schema)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(space: &str, token: &str) -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            api_root: None,
            space: space.to_string(),
            token: token.to_string(),
            account: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            schema: ResponseSchema::default(),
        }
    }

    /// Read `COLONY_SPACE`, `COLONY_TOKEN`, `COLONY_ACCOUNT`, `COLONY_HOST`,
    /// `COLONY_API_ROOT` and `COLONY_RESPONSE_SCHEMA`
    ///
    /// Missing space or token are left empty; [`ClientConfig::validate`]
    /// reports them.
    pub fn from_env() -> Result<Self> {
        let mut config = ClientConfig::new(
            &std::env::var(ENV_SPACE).unwrap_or_default(),
            &std::env::var(ENV_TOKEN).unwrap_or_default(),
        );

        if let Ok(host) = std::env::var(ENV_HOST) {
            if !host.is_empty() {
                config.host = host;
            }
        }
        config.account = std::env::var(ENV_ACCOUNT).ok().filter(|a| !a.is_empty());
        if let Ok(root) = std::env::var(ENV_API_ROOT) {
            if !root.is_empty() {
                config = config.with_api_root(&root);
            }
        }
        if let Ok(schema) = std::env::var(ENV_RESPONSE_SCHEMA) {
            if !schema.is_empty() {
                config.schema = schema.parse()?;
            }
        }

        Ok(config)
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn with_api_root(mut self, root: &str) -> Self {
        self.api_root = Some(root.trim_end_matches('/').to_string());
        self
    }

    /// Empty means no account
    pub fn with_account(mut self, account: Option<&str>) -> Self {
        self.account = account.filter(|a| !a.is_empty()).map(str::to_string);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.space.trim().is_empty() || self.token.trim().is_empty() {
            return Err(SandboxError::Config(
                "Space or token were not provided".to_string(),
            ));
        }
        if self.host.trim().is_empty() && self.api_root.is_none() {
            return Err(SandboxError::Config("Host is empty".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(SandboxError::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }
        self.schema.validate()
    }

    /// `https://{host}/api/spaces/{space}`
    pub fn base_api_url(&self) -> String {
        let root = self
            .api_root
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.host));
        format!("{}/api/spaces/{}", root, self.space)
    }

    /// Web URL of a sandbox, when an account is configured
    pub fn sandbox_url(&self, id: &SandboxId) -> Option<String> {
        self.account.as_ref().map(|account| {
            format!(
                "https://{}.{}/{}/sandboxes/{}",
                account, self.host, self.space, id
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_api_url() {
        let config = ClientConfig::new("dev", "t0k3n");
        assert_eq!(
            config.base_api_url(),
            "https://cloudshellcolony.com/api/spaces/dev"
        );

        let local = config.with_api_root("http://127.0.0.1:8080/");
        assert_eq!(local.base_api_url(), "http://127.0.0.1:8080/api/spaces/dev");
    }

    #[test]
    fn test_sandbox_url_requires_account() {
        let id = SandboxId::new("abc123");
        let config = ClientConfig::new("dev", "t");
        assert_eq!(config.sandbox_url(&id), None);

        let config = config.with_account(Some("acme"));
        assert_eq!(
            config.sandbox_url(&id).as_deref(),
            Some("https://acme.cloudshellcolony.com/dev/sandboxes/abc123")
        );

        assert_eq!(ClientConfig::new("dev", "t").with_account(Some("")).account, None);
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        assert!(ClientConfig::new("dev", "t").validate().is_ok());
        for (space, token) in [("", "t"), ("dev", ""), ("  ", "t")] {
            let err = ClientConfig::new(space, token).validate().unwrap_err();
            assert!(matches!(err, SandboxError::Config(_)));
        }
    }

    #[test]
    fn test_from_env() {
        // The only test in this crate that touches COLONY_* variables
        std::env::set_var(ENV_SPACE, "env-space");
        std::env::set_var(ENV_TOKEN, "env-token");
        std::env::set_var(ENV_ACCOUNT, "");
        std::env::set_var(ENV_RESPONSE_SCHEMA, "nested");
        std::env::remove_var(ENV_HOST);
        std::env::remove_var(ENV_API_ROOT);

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.space, "env-space");
        assert_eq!(config.token, "env-token");
        assert_eq!(config.account, None);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.schema, ResponseSchema::nested());

        std::env::set_var(ENV_RESPONSE_SCHEMA, "bogus");
        assert!(ClientConfig::from_env().is_err());

        for var in [ENV_SPACE, ENV_TOKEN, ENV_ACCOUNT, ENV_RESPONSE_SCHEMA] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ClientConfig::new("dev", "super-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }
}
