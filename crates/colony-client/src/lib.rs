//! Colony Client: sandbox API access for CI actions
//!
//! This crate talks to the Colony sandbox API: it starts sandboxes from
//! blueprints, reads their status, ends them, and waits for a launching
//! sandbox to become active.
//!
//! ## Layout
//!
//! - [`client`]: authenticated HTTP calls and error normalization
//! - [`poller`]: bounded wait for the `Active` status
//! - [`schema`]: where status and progress live in a sandbox document
//! - [`params`]: `key=value` lists and ISO-8601 durations

pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod params;
pub mod poller;
pub mod schema;
pub mod telemetry;

pub use client::{ApiMethod, ColonyClient, SandboxApi};
pub use config::ClientConfig;
pub use error::{ApiError, ApiErrorEntry, SandboxError};
pub use model::{Progress, Sandbox, SandboxId, SandboxRequest, SandboxStatus};
pub use params::{iso_duration, KeyValues};
pub use poller::{StatePoller, POLL_INTERVAL};
pub use schema::ResponseSchema;
pub use telemetry::init_tracing;

/// Result type for colony-client operations
pub type Result<T> = std::result::Result<T, SandboxError>;
