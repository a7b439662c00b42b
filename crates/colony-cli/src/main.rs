//! Colony Sandbox Actions CLI
//!
//! The `colony` command drives Colony sandboxes from a CI job.
//!
//! ## Commands
//!
//! - `start`: Start a sandbox from a blueprint and emit its id
//! - `wait`: Wait for a sandbox to become active
//! - `stop`: End a sandbox
//!
//! Space, token and account come from `COLONY_SPACE`, `COLONY_TOKEN` and
//! `COLONY_ACCOUNT` unless given as flags.

mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colony_client::config::{
    DEFAULT_HOST, ENV_ACCOUNT, ENV_API_ROOT, ENV_HOST, ENV_RESPONSE_SCHEMA, ENV_SPACE, ENV_TOKEN,
};
use colony_client::model::DEFAULT_DURATION_MINUTES;
use colony_client::{
    ClientConfig, ColonyClient, KeyValues, ResponseSchema, SandboxApi, SandboxError, SandboxId,
    SandboxRequest, StatePoller,
};
use output::{ActionsConsole, OutputSink};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "colony")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Start, wait for and stop Colony sandboxes from CI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Colony space
    #[arg(long, env = ENV_SPACE, default_value = "", hide_env_values = true, global = true)]
    space: String,

    /// API token
    #[arg(long, env = ENV_TOKEN, default_value = "", hide_env_values = true, global = true)]
    token: String,

    /// Account name, used to print the sandbox URL
    #[arg(long, env = ENV_ACCOUNT, global = true)]
    account: Option<String>,

    /// Colony host
    #[arg(long, env = ENV_HOST, default_value = DEFAULT_HOST, global = true)]
    host: String,

    /// API root replacing https://<host> (self-hosted or test servers)
    #[arg(long, env = ENV_API_ROOT, hide = true, global = true)]
    api_root: Option<String>,

    /// Layout of the sandbox status response: flat or nested
    #[arg(long, env = ENV_RESPONSE_SCHEMA, default_value = "flat", global = true)]
    response_schema: ResponseSchema,

    /// JSON pointer to the status field, overriding the layout
    #[arg(long, global = true)]
    status_path: Option<String>,

    /// JSON pointer to the launch progress, overriding the layout
    #[arg(long, global = true)]
    progress_path: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    request_timeout: u64,
}

impl ConnectionArgs {
    fn client_config(&self) -> ClientConfig {
        let mut schema = self.response_schema.clone();
        if let Some(pointer) = &self.status_path {
            schema = schema.with_status_path(pointer);
        }
        if let Some(pointer) = &self.progress_path {
            schema = schema.with_progress_path(pointer);
        }

        let mut config = ClientConfig::new(&self.space, &self.token)
            .with_host(&self.host)
            .with_account(self.account.as_deref())
            .with_request_timeout(Duration::from_secs(self.request_timeout))
            .with_schema(schema);
        if let Some(root) = self.api_root.as_deref().filter(|r| !r.is_empty()) {
            config = config.with_api_root(root);
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start a sandbox from a blueprint
    Start {
        /// The name of the source blueprint
        blueprint_name: String,

        /// The name of the sandbox
        sandbox_name: String,

        /// Sandbox lifetime in minutes
        #[arg(short, long, default_value_t = DEFAULT_DURATION_MINUTES)]
        duration: u64,

        /// Run the blueprint version from a remote Git branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Blueprint inputs as a comma-separated list of key=value pairs
        #[arg(short, long)]
        inputs: Option<KeyValues>,

        /// Artifacts per application as a comma-separated list of key=value pairs
        #[arg(short, long)]
        artifacts: Option<KeyValues>,
    },

    /// Wait for a sandbox to become active
    Wait {
        /// Sandbox id
        sandbox_id: String,

        /// Minutes to wait for the sandbox to become active
        timeout: u64,
    },

    /// End a sandbox
    Stop {
        /// Sandbox id
        sandbox_id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            let _ = report_usage_error(&e, &mut ActionsConsole::stdout());
            return ExitCode::FAILURE;
        }
    };

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    colony_client::init_tracing(cli.json, level);

    let mut console = ActionsConsole::stdout();
    match run(cli, &mut console).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = console.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, sink: &mut dyn OutputSink) -> Result<()> {
    let config = cli.connection.client_config();
    debug!(?config, "Resolved client configuration");
    let client = ColonyClient::new(config).context("Unable to create Colony client")?;

    match cli.command {
        Commands::Start {
            blueprint_name,
            sandbox_name,
            duration,
            branch,
            inputs,
            artifacts,
        } => {
            let request = SandboxRequest::new(&blueprint_name, &sandbox_name)
                .with_duration(duration)
                .with_inputs(inputs.unwrap_or_default())
                .with_artifacts(artifacts.unwrap_or_default())
                .with_branch(branch.as_deref());
            cmd_start(&client, &request, sink).await.map(|_| ())
        }
        Commands::Wait {
            sandbox_id,
            timeout,
        } => cmd_wait(&client, &sandbox_id, timeout, &StatePoller::new(), sink).await,
        Commands::Stop { sandbox_id } => cmd_stop(&client, &sandbox_id, sink).await,
    }
}

/// Annotate a rejected command line for the CI runner
fn report_usage_error(err: &clap::Error, sink: &mut dyn OutputSink) -> std::io::Result<()> {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    sink.error(first.strip_prefix("error: ").unwrap_or(first))
}

fn parse_sandbox_id(raw: &str) -> Result<SandboxId> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SandboxError::Validation("Sandbox Id cannot be empty".to_string()).into());
    }
    Ok(SandboxId::new(trimmed))
}

/// Start a sandbox and publish its id
async fn cmd_start(
    client: &ColonyClient,
    request: &SandboxRequest,
    sink: &mut dyn OutputSink,
) -> Result<SandboxId> {
    let id = client
        .start(request)
        .await
        .context("Unable to start sandbox")?;

    sink.success(&format!("Sandbox {} has started", id))?;
    if let Some(url) = client.config().sandbox_url(&id) {
        sink.message(&format!("Sandbox URL: {}", url))?;
    }
    sink.set_output("sandbox_id", id.as_str())?;

    Ok(id)
}

/// Poll until the sandbox is active and publish its details
async fn cmd_wait(
    api: &dyn SandboxApi,
    sandbox_id: &str,
    timeout: u64,
    poller: &StatePoller,
    sink: &mut dyn OutputSink,
) -> Result<()> {
    let id = parse_sandbox_id(sandbox_id)?;
    sink.message(&format!("Waiting for the Sandbox {} to start...", id))?;

    let mut write_error = None;
    let result = poller
        .wait(api, &id, timeout, |progress| {
            if let Err(e) = sink.message(&format!("Current state: {}", progress)) {
                write_error.get_or_insert(e);
            }
        })
        .await;
    if let Some(e) = write_error {
        return Err(e.into());
    }

    let sandbox = match result {
        Ok(sandbox) => sandbox,
        Err(e @ (SandboxError::Timeout { .. } | SandboxError::TerminalFailure { .. })) => {
            return Err(e.into())
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("Unable to get sandbox with ID {}", id)))
        }
    };

    let details = serde_json::to_string(&sandbox.details)?;
    sink.set_output("sandbox_details", &details)?;
    sink.success(&format!("Sandbox {} is active!", id))?;

    Ok(())
}

/// End a sandbox
async fn cmd_stop(api: &dyn SandboxApi, sandbox_id: &str, sink: &mut dyn OutputSink) -> Result<()> {
    let id = parse_sandbox_id(sandbox_id)?;
    api.end(&id)
        .await
        .with_context(|| format!("Unable to stop sandbox {}", id))?;

    sink.success(&format!("Sandbox {} has been stopped", id))?;
    Ok(())
}
