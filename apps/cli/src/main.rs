//! Rolesync command line: reconciles local role files with a remote role authority.

#![forbid(unsafe_code)]

mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use rolesync_application::{
    ExecutorOptions, Retrier, RetryObserver, RetryState, RetryingRoleStore, RoleStore,
    RoleSyncService,
};
use rolesync_core::{AppError, AppResult};
use rolesync_domain::{Role, validate_unique_members};
use rolesync_infrastructure::{HttpRoleStore, InMemoryRoleStore, YamlRoleLoader};

use crate::config::{ConnectionArgs, RemoteTarget, SyncConfig};

/// Reconcile declarative role files with a remote role authority
#[derive(Debug, Parser)]
#[command(name = "rolesync", version)]
struct Cli {
    /// Directory holding *.yaml / *.yml role files
    #[arg(long, env = "ROLESYNC_ROLES_DIR", default_value = "roles", global = true)]
    roles_dir: PathBuf,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compare local roles with remote roles and print the change plan
    Plan {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Compute the change plan and apply it
    Sync {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Walk the plan without changing remote state
        #[arg(long)]
        dry_run: bool,

        /// Do not invite members unknown to the remote authority
        #[arg(long, env = "ROLESYNC_NO_INVITE")]
        no_invite: bool,
    },
    /// Check local role files without contacting the remote authority
    Validate,
}

/// Logs every retry state transition at debug level.
struct TracingRetryObserver;

impl RetryObserver for TracingRetryObserver {
    fn on_transition(&self, operation: &str, state: RetryState) {
        debug!(operation, ?state, "retry state changed");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(error = %error, "rolesync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let local = YamlRoleLoader.load_dir(&cli.roles_dir)?;

    match cli.command {
        Command::Validate => {
            validate_unique_members(&local)?;
            if cli.json {
                println!("{}", output::validation_json(&local)?);
            } else {
                println!("{}", output::render_validation(&local));
            }
            Ok(())
        }
        Command::Plan { connection } => {
            let config = SyncConfig::load(&connection, ExecutorOptions::default())?;
            let cancel = spawn_cancellation(config.timeout);
            let plan = build_service(&config)?.plan(&local, &cancel).await?;

            if cli.json {
                println!("{}", output::plan_json(&plan)?);
            } else {
                println!("{}", output::render_plan(&plan));
            }
            Ok(())
        }
        Command::Sync {
            connection,
            dry_run,
            no_invite,
        } => {
            let executor = ExecutorOptions {
                dry_run,
                invite_missing_members: !no_invite,
            };
            let config = SyncConfig::load(&connection, executor)?;
            sync(&config, &local, cli.json).await
        }
    }
}

async fn sync(config: &SyncConfig, local: &[Role], json: bool) -> AppResult<()> {
    let cancel = spawn_cancellation(config.timeout);
    let outcome = build_service(config)?.sync(local, &cancel).await?;

    if json {
        println!("{}", output::sync_json(&outcome)?);
    } else {
        if !outcome.plan.is_empty() {
            println!("{}", output::render_plan(&outcome.plan));
        }
        println!("{}", output::render_result(&outcome.result));
    }

    outcome.result.into_result().map(|_| ())
}

fn build_service(config: &SyncConfig) -> AppResult<RoleSyncService> {
    let inner: Arc<dyn RoleStore> = match &config.remote {
        RemoteTarget::Http {
            api_url,
            token,
            request_timeout,
        } => {
            let http_client = reqwest::Client::builder()
                .timeout(*request_timeout)
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            info!(api_url = %api_url, "reconciling against remote role authority");
            Arc::new(HttpRoleStore::new(http_client, api_url.clone(), token.clone()))
        }
        RemoteTarget::InMemory => {
            info!("reconciling against empty in-memory role store");
            Arc::new(InMemoryRoleStore::new())
        }
    };

    let retrier = Retrier::new(config.retry_policy).with_observer(Arc::new(TracingRetryObserver));
    let store = Arc::new(RetryingRoleStore::new(inner, retrier));

    Ok(RoleSyncService::new(store, config.executor))
}

/// Returns a token cancelled on Ctrl-C or when the optional deadline passes.
fn spawn_cancellation(timeout: Option<Duration>) -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        let interrupted = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!(error = %error, "failed to listen for interrupt signal");
                std::future::pending::<()>().await;
            }
        };
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = trigger.cancelled() => return,
            () = interrupted => warn!("interrupt received, cancelling run"),
            () = deadline => warn!(
                timeout_secs = timeout.map_or(0, |timeout| timeout.as_secs()),
                "run deadline reached, cancelling"
            ),
        }

        trigger.cancel();
    });

    cancel
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
