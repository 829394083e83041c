// src/main.rs
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    vault_init::cli::run_cli().await
}
