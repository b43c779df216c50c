use std::env;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;

use parley::{ServerConfig, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing, honoring RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    // Handle CLI arguments
    let mut args = env::args();
    let _ = args.next();
    let mut config_path: Option<PathBuf> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                config_path = Some(PathBuf::from(path));
            }
            other => {
                anyhow::bail!("Unknown argument '{other}'. Usage: parley [--config <file.yaml>]");
            }
        }
    }

    // Load configuration
    let config = match &config_path {
        Some(path) => ServerConfig::from_file(path),
        None => ServerConfig::from_env(),
    }
    .map_err(|e| anyhow!(e.to_string()))?;
    let address = config.address();

    // Create application state
    let app_state = AppState::new(config)
        .await
        .map_err(|e| anyhow!("Failed to initialize collaborators: {e}"))?;

    let app = routes::create_app(app_state.clone());

    // Create listener
    let listener = TcpListener::bind(&address).await?;

    info!("Server listening on {address}");

    // Start server
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    app_state.shutdown().await;

    Ok(())
}
