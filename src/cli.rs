use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::poll::{shutdown_signal, PollLoop};

pub const SERVICE_ACCOUNT_TOKEN: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const SERVICE_ACCOUNT_CA: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Kubernetes Secret in the target namespace
    Kubernetes,
    /// Local SQLite database file
    Sqlite,
}

#[derive(Debug, Parser)]
#[command(
    name = "vault-init",
    about = "Keeps a Vault server initialized and unsealed",
    version
)]
pub struct Cli {
    /// Vault server address.
    #[arg(long, default_value = "http://127.0.0.1:8200", env = "VAULT_ADDR")]
    pub vault_addr: String,

    /// Seconds between health checks.
    #[arg(long, default_value_t = 10, env = "CHECK_INTERVAL")]
    pub check_interval: u64,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, env = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// PEM CA bundle used to verify Vault's certificate.
    #[arg(long, env = "VAULT_CACERT")]
    pub vault_cacert: Option<PathBuf>,

    /// Do not verify Vault's TLS certificate.
    #[arg(long, env = "VAULT_SKIP_VERIFY")]
    pub vault_skip_verify: bool,

    /// Name of the secret holding the root token and unseal keys.
    #[arg(long, default_value = "vault-tokens", env = "VAULT_SECRET_NAME")]
    pub secret_name: String,

    /// Where unseal keys are persisted.
    #[arg(long, value_enum, default_value_t = StoreBackend::Kubernetes, env = "SECRET_STORE")]
    pub store: StoreBackend,

    /// Kubernetes namespace for the secret.
    #[arg(long, default_value = "default", env = "KUBERNETES_NAMESPACE")]
    pub namespace: String,

    /// Kubernetes API host; without host and port, kubectl proxy on localhost:8001 is used.
    #[arg(long, env = "KUBERNETES_SERVICE_HOST")]
    pub kubernetes_host: Option<String>,

    /// Kubernetes API port.
    #[arg(long, env = "KUBERNETES_PORT_443_TCP_PORT")]
    pub kubernetes_port: Option<u16>,

    /// Bearer token file for the Kubernetes API, read on every request.
    #[arg(long, default_value = SERVICE_ACCOUNT_TOKEN, env = "KUBERNETES_TOKEN_FILE")]
    pub kubernetes_token_file: PathBuf,

    /// PEM CA bundle for the Kubernetes API (defaults to the service account CA when present).
    #[arg(long, env = "KUBERNETES_CA_FILE")]
    pub kubernetes_ca_file: Option<PathBuf>,

    /// SQLite database path for the sqlite store.
    #[arg(long, default_value = "vault-init.db", env = "SQLITE_PATH")]
    pub sqlite_path: PathBuf,

    /// Log filter directives.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_filter: String,
}

fn init_tracing(filter: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .with_context(|| format!("Invalid log filter {:?}", filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter)?;
    info!("Starting the vault-init service...");

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e.into());
        }
    };

    let vault = Arc::new(config.vault_client()?);
    let store = config.secret_store()?;
    info!(
        "Watching Vault at {}, keys stored in {} ({:?} store)",
        config.vault.url, config.secret_name, cli.store
    );

    let orchestrator = Orchestrator::new(vault, store, config.secret_name.clone());
    let poll_loop = PollLoop::new(orchestrator, config.check_interval);

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });

    poll_loop.run(rx).await;
    Ok(())
}
