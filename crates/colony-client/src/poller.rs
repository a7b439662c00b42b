//! Sandbox state poller
//!
//! Waits for a launching sandbox to become active within a wall-clock
//! budget. Progress is reported through a callback and only when the
//! simplified snapshot changes between polls.

use crate::client::SandboxApi;
use crate::error::SandboxError;
use crate::model::{Progress, Sandbox, SandboxId, SandboxStatus};
use crate::Result;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Pause between two status checks
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Polls a sandbox until it is active, failed, or out of time
#[derive(Debug, Clone)]
pub struct StatePoller {
    interval: Duration,
}

impl Default for StatePoller {
    fn default() -> Self {
        StatePoller {
            interval: POLL_INTERVAL,
        }
    }
}

impl StatePoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(interval: Duration) -> Self {
        StatePoller { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for `id` to become active
    ///
    /// * `Active`: returns the sandbox.
    /// * `Launching`: reports progress if it changed, sleeps, polls again.
    /// * anything else: [`SandboxError::TerminalFailure`] at once.
    ///
    /// A failed status read ends the wait with that error. Running out of
    /// `timeout_minutes` yields [`SandboxError::Timeout`]; the budget is
    /// checked once per iteration, in whole seconds.
    pub async fn wait<A, F>(
        &self,
        api: &A,
        id: &SandboxId,
        timeout_minutes: u64,
        mut on_progress: F,
    ) -> Result<Sandbox>
    where
        A: SandboxApi + ?Sized,
        F: FnMut(&Progress),
    {
        let started = Instant::now();
        let budget_secs = timeout_minutes.saturating_mul(60);
        let mut reported: Option<Progress> = None;
        let mut polls: u64 = 0;

        while started.elapsed().as_secs() < budget_secs {
            polls += 1;
            let sandbox = api.get(id).await.map_err(|e| {
                warn!(sandbox_id = %id, error = %e, "Status read failed");
                e
            })?;
            debug!(sandbox_id = %id, status = %sandbox.status, polls, "Polled sandbox");

            match &sandbox.status {
                SandboxStatus::Active => {
                    info!(sandbox_id = %id, polls, "Sandbox is active");
                    return Ok(sandbox);
                }
                SandboxStatus::Launching => {
                    let snapshot = sandbox.progress_snapshot();
                    if reported.as_ref() != Some(&snapshot) {
                        info!(sandbox_id = %id, progress = %snapshot, "Launch progress changed");
                        on_progress(&snapshot);
                        reported = Some(snapshot);
                    }
                    tokio::time::sleep(self.interval).await;
                }
                SandboxStatus::Other(status) => {
                    warn!(sandbox_id = %id, %status, "Sandbox launch failed");
                    return Err(SandboxError::TerminalFailure {
                        id: id.to_string(),
                        status: status.clone(),
                    });
                }
            }
        }

        warn!(sandbox_id = %id, timeout_minutes, polls, "Gave up waiting for sandbox");
        Err(SandboxError::Timeout {
            id: id.to_string(),
            minutes: timeout_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SandboxRequest;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysLaunching {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SandboxApi for AlwaysLaunching {
        async fn start(&self, _request: &SandboxRequest) -> Result<SandboxId> {
            unreachable!("poller never starts sandboxes")
        }

        async fn get(&self, id: &SandboxId) -> Result<Sandbox> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Sandbox::new(
                id.clone(),
                SandboxStatus::Launching,
                json!({"deploy": {"status": "Pending"}}),
                Value::Null,
            ))
        }

        async fn end(&self, _id: &SandboxId) -> Result<()> {
            unreachable!("poller never ends sandboxes")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_never_polls() {
        let api = AlwaysLaunching {
            calls: AtomicUsize::new(0),
        };
        let err = StatePoller::new()
            .wait(&api, &SandboxId::new("sb"), 0, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::Timeout { minutes: 0, .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_progress_reported_once() {
        let api = AlwaysLaunching {
            calls: AtomicUsize::new(0),
        };
        let mut reports = 0;
        let err = StatePoller::new()
            .wait(&api, &SandboxId::new("sb"), 1, |_| reports += 1)
            .await
            .unwrap_err();

        assert!(matches!(err, SandboxError::Timeout { .. }));
        assert_eq!(reports, 1);
        assert_eq!(api.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_default_interval() {
        assert_eq!(StatePoller::default().interval(), Duration::from_secs(10));
    }
}
