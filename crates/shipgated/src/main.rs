//! shipgated — the shipgate deployment gateway daemon.
//!
//! Assembles the record store (redb), the Nomad client, the deployment
//! engine and the HTTP API into one process.
//!
//! # Usage
//!
//! ```text
//! RPC_SECRET=... shipgated serve --config /etc/shipgate.toml --port 8080
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use shipgate_core::GatewayConfig;
use tracing::info;

#[derive(Parser)]
#[command(name = "shipgated", about = "shipgate deployment gateway daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the gateway HTTP API.
    Serve(ServeArgs),
}

#[derive(clap::Args, Debug, Default)]
struct ServeArgs {
    /// TOML config file. Environment variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT).
    #[arg(long)]
    port: Option<u16>,

    /// Data directory for the record store (overrides config and SHIPGATE_DATA_DIR).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            init_tracing(args.log_format);
            let config = load_config(&args, |key| std::env::var(key).ok())?;
            run_serve(config).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,shipgated=debug,shipgate=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

/// Defaults, then the config file, then the environment, then CLI flags.
fn load_config<F>(args: &ServeArgs, lookup: F) -> anyhow::Result<GatewayConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    config.apply_env(lookup)?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn run_serve(config: GatewayConfig) -> anyhow::Result<()> {
    info!(
        nomad_url = %config.nomad_url,
        identity = %config.identity,
        token_configured = config.nomad_token.is_some(),
        "shipgate gateway starting"
    );

    let store = open_store(&config.data_dir, &config.db_path())?;

    let nomad_config = shipgate_nomad::NomadClientConfig::new(config.nomad_url.clone())
        .with_token(config.nomad_token.clone())
        .with_skip_tls_verify(config.skip_tls_verify);
    let nomad = shipgate_nomad::NomadClient::new(&nomad_config)
        .context("failed to build Nomad client")?;
    info!(url = %nomad.base_url(), "nomad client initialized");

    let engine = shipgate_engine::DeploymentEngine::new(store, Arc::new(nomad), config.identity.clone());
    let state = shipgate_api::ApiState::new(Arc::new(engine), &config.secret_key);
    let router = shipgate_api::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shipgate gateway stopped");
    Ok(())
}

fn open_store(data_dir: &Path, db_path: &Path) -> anyhow::Result<shipgate_state::RecordStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let store = shipgate_state::RecordStore::open(db_path)
        .with_context(|| format!("failed to open record store {}", db_path.display()))?;
    info!(path = ?db_path, "record store opened");
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c, shutting down");
    }
    info!("shutdown signal received");
}
