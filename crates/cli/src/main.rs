#![forbid(unsafe_code)]

mod repl;
mod terminal;

use clap::Parser;
use sp_core::ProjectId;
use sp_engine::{EngineConfig, EngineError, Session};
use sp_storage::{SqliteStore, StoreError};
use sp_sync::{HttpRemote, HttpRemoteConfig, RemoteSync, SyncError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use terminal::{StdinPrompt, TerminalRenderer};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Grow an idea into a tree of statements from the terminal.
#[derive(Parser, Debug)]
#[command(name = "sprout", version, about)]
struct Cli {
    /// Base URL of the project API.
    #[arg(long, env = "SPROUT_API_URL")]
    api_url: Option<String>,

    /// Bearer token sent with every request.
    #[arg(long, env = "SPROUT_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Keep the project in a local SQLite database under DIR instead of the API.
    #[arg(long, value_name = "DIR")]
    local: Option<PathBuf>,

    #[arg(long, env = "SPROUT_PROJECT", default_value = "default")]
    project: String,

    /// Emit logs as JSON lines on stderr.
    #[arg(long)]
    log_json: bool,
}

#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("stdin: {0}")]
    Io(#[from] std::io::Error),
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_env("SPROUT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn connect(cli: &Cli) -> Result<Arc<dyn RemoteSync>, CliError> {
    if let Some(dir) = &cli.local {
        let store = SqliteStore::open(dir)?;
        info!(dir = %store.storage_dir().display(), "using local storage");
        return Ok(Arc::new(store));
    }
    let mut config = HttpRemoteConfig::from_env();
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    if cli.token.is_some() {
        config.api_token = cli.token.clone();
    }
    let remote = HttpRemote::new(config)?;
    info!(url = %remote.config().base_url, "using remote api");
    Ok(Arc::new(remote))
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let project = ProjectId::try_new(cli.project.clone())
        .map_err(|err| CliError::Usage(format!("--project: {}", err.message())))?;
    let remote = connect(&cli)?;

    let lines = terminal::stdin_lines();
    let session = Session::open(
        project,
        remote,
        Arc::new(TerminalRenderer),
        Arc::new(StdinPrompt::new(lines.clone())),
        EngineConfig::from_env(),
    )
    .await?;
    repl::run(&session, lines).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "sprout stopped");
            eprintln!("sprout: {err}");
            ExitCode::FAILURE
        }
    }
}
