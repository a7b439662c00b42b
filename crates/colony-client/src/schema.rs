//! Response layouts for `GET sandbox/{id}`
//!
//! Deployments of the API disagree on where status and progress live.
//! The layout is configuration: pick a preset or supply JSON pointers.

use crate::error::SandboxError;
use crate::model::{Sandbox, SandboxId, SandboxStatus};
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Where to find status, progress and details in a sandbox document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSchema {
    /// JSON pointer to the status string
    pub status_path: String,
    /// JSON pointer to the launch progress (may be absent)
    pub progress_path: String,
    /// JSON pointer to the details document; empty means the whole body
    pub details_path: String,
}

impl Default for ResponseSchema {
    fn default() -> Self {
        ResponseSchema::flat()
    }
}

impl ResponseSchema {
    /// `{sandbox_status, launching_progress, ...}`
    pub fn flat() -> Self {
        ResponseSchema {
            status_path: "/sandbox_status".to_string(),
            progress_path: "/launching_progress".to_string(),
            details_path: String::new(),
        }
    }

    /// `{details: {computed_status, state: {current_state}}, ...}`
    pub fn nested() -> Self {
        ResponseSchema {
            status_path: "/details/computed_status".to_string(),
            progress_path: "/details/state/current_state".to_string(),
            details_path: "/details".to_string(),
        }
    }

    pub fn with_status_path(mut self, pointer: &str) -> Self {
        self.status_path = pointer.to_string();
        self
    }

    pub fn with_progress_path(mut self, pointer: &str) -> Self {
        self.progress_path = pointer.to_string();
        self
    }

    pub fn with_details_path(mut self, pointer: &str) -> Self {
        self.details_path = pointer.to_string();
        self
    }

    /// Reject pointers that `serde_json` would never resolve
    pub fn validate(&self) -> Result<()> {
        for (name, pointer) in [
            ("status", &self.status_path),
            ("progress", &self.progress_path),
            ("details", &self.details_path),
        ] {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(SandboxError::Config(format!(
                    "{} path '{}' must be a JSON pointer starting with '/'",
                    name, pointer
                )));
            }
        }
        if self.status_path.is_empty() {
            return Err(SandboxError::Config("status path is empty".to_string()));
        }
        Ok(())
    }

    /// Decode a sandbox document fetched for `id`
    pub fn decode(&self, id: &SandboxId, body: Value) -> Result<Sandbox> {
        let details = body
            .pointer(&self.details_path)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| unknown_format(&body))?;

        let status = match body.pointer(&self.status_path) {
            Some(Value::String(s)) => SandboxStatus::from(s.as_str()),
            _ => return Err(unknown_format(&body)),
        };

        let progress = body
            .pointer(&self.progress_path)
            .cloned()
            .unwrap_or(Value::Null);

        let progress_key = self
            .progress_path
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("progress")
            .to_string();

        Ok(Sandbox {
            id: id.clone(),
            status,
            progress,
            details,
            progress_key,
        })
    }
}

pub(crate) fn unknown_format(body: impl std::fmt::Display) -> SandboxError {
    SandboxError::MalformedResponse(format!(
        "Colony API returned unknown format of response: {}",
        body
    ))
}

impl FromStr for ResponseSchema {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(ResponseSchema::flat()),
            "nested" => Ok(ResponseSchema::nested()),
            other => Err(SandboxError::Config(format!(
                "unknown response schema '{}', expected 'flat' or 'nested'",
                other
            ))),
        }
    }
}
