//! Quarry server binary.
//!
//! Loads the config file, starts the HTTP server, and runs until Ctrl-C.
//! Tracing goes to stderr; set `RUST_LOG` to change the filter.

use quarry::QuarryConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let path = QuarryConfig::default_config_path();
    let config = QuarryConfig::load_or_default(&path)
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;

    tracing::info!(config = %path.display(), "quarry starting");

    let server = quarry::startup::start(config).await.map_err(|e| {
        tracing::error!(error = %e, "quarry failed to start");
        anyhow::anyhow!("quarry failed to start: {e}")
    })?;

    tokio::signal::ctrl_c().await?;
    server.shutdown();

    tracing::info!("quarry shut down cleanly");
    Ok(())
}
