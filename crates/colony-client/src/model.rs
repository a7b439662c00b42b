//! Sandbox data model
//!
//! Types exchanged with the Colony sandbox API: the creation request, the
//! fetched sandbox and its simplified launch progress.

use crate::params::{iso_duration, KeyValues};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default sandbox lifetime in minutes
pub const DEFAULT_DURATION_MINUTES: u64 = 120;

/// Identifier assigned by the API when a sandbox is started
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SandboxId(String);

impl SandboxId {
    pub fn new(id: impl Into<String>) -> Self {
        SandboxId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SandboxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SandboxId {
    fn from(id: String) -> Self {
        SandboxId(id)
    }
}

impl From<&str> for SandboxId {
    fn from(id: &str) -> Self {
        SandboxId(id.to_string())
    }
}

/// Sandbox status as reported by the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxStatus {
    Launching,
    Active,
    /// Anything else; treated as a terminal failure by the poller
    Other(String),
}

impl SandboxStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SandboxStatus::Launching => "Launching",
            SandboxStatus::Active => "Active",
            SandboxStatus::Other(s) => s,
        }
    }
}

impl From<&str> for SandboxStatus {
    fn from(s: &str) -> Self {
        match s {
            "Launching" => SandboxStatus::Launching,
            "Active" => SandboxStatus::Active,
            other => SandboxStatus::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source branch override for a sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SandboxSource {
    pub branch: String,
}

/// Parameters for starting a sandbox
///
/// Built once per start invocation; the `with_*` methods consume the
/// request so it cannot change after it is handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxRequest {
    blueprint_name: String,
    sandbox_name: String,
    duration_minutes: u64,
    inputs: KeyValues,
    artifacts: KeyValues,
    branch: Option<String>,
}

impl SandboxRequest {
    pub fn new(blueprint_name: &str, sandbox_name: &str) -> Self {
        SandboxRequest {
            blueprint_name: blueprint_name.to_string(),
            sandbox_name: sandbox_name.to_string(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            inputs: KeyValues::new(),
            artifacts: KeyValues::new(),
            branch: None,
        }
    }

    pub fn with_duration(mut self, minutes: u64) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn with_inputs(mut self, inputs: KeyValues) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_artifacts(mut self, artifacts: KeyValues) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Run the blueprint version from a remote Git branch. Empty means none.
    pub fn with_branch(mut self, branch: Option<&str>) -> Self {
        self.branch = branch.filter(|b| !b.is_empty()).map(str::to_string);
        self
    }

    pub fn blueprint_name(&self) -> &str {
        &self.blueprint_name
    }

    pub fn sandbox_name(&self) -> &str {
        &self.sandbox_name
    }

    pub fn duration_minutes(&self) -> u64 {
        self.duration_minutes
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Wire body for `POST sandbox`
    pub fn to_body(&self) -> CreateSandboxBody<'_> {
        CreateSandboxBody {
            sandbox_name: &self.sandbox_name,
            blueprint_name: &self.blueprint_name,
            duration: iso_duration(self.duration_minutes),
            inputs: &self.inputs,
            artifacts: &self.artifacts,
            source: self.branch.as_ref().map(|branch| SandboxSource {
                branch: branch.clone(),
            }),
        }
    }
}

/// JSON body of the creation call
#[derive(Debug, Serialize)]
pub struct CreateSandboxBody<'a> {
    pub sandbox_name: &'a str,
    pub blueprint_name: &'a str,
    pub duration: String,
    pub inputs: &'a KeyValues,
    pub artifacts: &'a KeyValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SandboxSource>,
}

/// Response of the creation call
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSandbox {
    pub id: Option<String>,
}

/// Simplified launch progress: step name to status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Progress(BTreeMap<String, String>);

impl Progress {
    /// Drop everything but each step's status
    ///
    /// `scalar_key` names the single entry produced when the API reports
    /// progress as a bare value instead of a per-step object.
    pub fn simplify(raw: &Value, scalar_key: &str) -> Self {
        let mut steps = BTreeMap::new();

        match raw {
            Value::Null => {}
            Value::Object(map) => {
                for (step, description) in map {
                    let status = match description {
                        Value::Object(fields) => match fields.get("status") {
                            Some(Value::String(s)) => s.clone(),
                            Some(other) => other.to_string(),
                            None => description.to_string(),
                        },
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    steps.insert(step.clone(), status);
                }
            }
            Value::String(s) => {
                steps.insert(scalar_key.to_string(), s.clone());
            }
            other => {
                steps.insert(scalar_key.to_string(), other.to_string());
            }
        }

        Progress(steps)
    }

    pub fn get(&self, step: &str) -> Option<&str> {
        self.0.get(step).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(no steps reported)");
        }
        for (i, (step, status)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", step, status)?;
        }
        Ok(())
    }
}

/// A sandbox as last fetched from the API
#[derive(Debug, Clone, PartialEq)]
pub struct Sandbox {
    pub id: SandboxId,
    pub status: SandboxStatus,
    /// Progress structure as the API returned it
    pub progress: Value,
    /// Full details document (what the `sandbox_details` output carries)
    pub details: Value,
    pub(crate) progress_key: String,
}

impl Sandbox {
    pub fn new(id: SandboxId, status: SandboxStatus, progress: Value, details: Value) -> Self {
        Sandbox {
            id,
            status,
            progress,
            details,
            progress_key: "progress".to_string(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SandboxStatus::Active
    }

    /// Step name to status, other per-step fields dropped
    pub fn progress_snapshot(&self) -> Progress {
        Progress::simplify(&self.progress, &self.progress_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_from_str() {
        assert_eq!(SandboxStatus::from("Active"), SandboxStatus::Active);
        assert_eq!(SandboxStatus::from("Launching"), SandboxStatus::Launching);
        assert_eq!(
            SandboxStatus::from("Ended"),
            SandboxStatus::Other("Ended".to_string())
        );
        // Matching is exact
        assert!(matches!(
            SandboxStatus::from("active"),
            SandboxStatus::Other(_)
        ));
    }

    #[test]
    fn test_request_body_with_branch() {
        let request = SandboxRequest::new("bp", "sb")
            .with_duration(45)
            .with_inputs(KeyValues::parse("size=small").unwrap())
            .with_branch(Some("feature/x"));

        let body = serde_json::to_value(request.to_body()).unwrap();
        assert_eq!(
            body,
            json!({
                "sandbox_name": "sb",
                "blueprint_name": "bp",
                "duration": "PT45M",
                "inputs": {"size": "small"},
                "artifacts": {},
                "source": {"branch": "feature/x"}
            })
        );
    }

    #[test]
    fn test_request_body_without_branch_omits_source() {
        let request = SandboxRequest::new("bp", "sb").with_branch(Some(""));
        assert_eq!(request.branch(), None);
        assert_eq!(request.duration_minutes(), DEFAULT_DURATION_MINUTES);

        let body = serde_json::to_value(request.to_body()).unwrap();
        assert!(body.get("source").is_none());
        assert_eq!(body["duration"], "PT120M");
    }

    #[test]
    fn test_progress_keeps_only_status() {
        let raw = json!({
            "creating_infrastructure": {"status": "Done", "started": "2021-01-01"},
            "deploying_applications": {"status": "Pending", "errors": []}
        });
        let progress = Progress::simplify(&raw, "progress");
        assert_eq!(progress.len(), 2);
        assert_eq!(progress.get("creating_infrastructure"), Some("Done"));
        assert_eq!(progress.get("deploying_applications"), Some("Pending"));
        assert_eq!(
            progress.to_string(),
            "creating_infrastructure: Done, deploying_applications: Pending"
        );
    }

    #[test]
    fn test_progress_equality_ignores_dropped_fields() {
        let a = Progress::simplify(&json!({"s1": {"status": "Done", "at": 1}}), "p");
        let b = Progress::simplify(&json!({"s1": {"status": "Done", "at": 2}}), "p");
        assert_eq!(a, b);
    }

    #[test]
    fn test_progress_scalar_and_null() {
        let scalar = Progress::simplify(&json!("Deploying"), "current_state");
        assert_eq!(scalar.get("current_state"), Some("Deploying"));

        assert!(Progress::simplify(&Value::Null, "p").is_empty());
    }
}
