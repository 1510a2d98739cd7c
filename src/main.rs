use std::sync::Arc;

use anyhow::Context;

use chat_filter::api::{self, AppState};
use chat_filter::config::AppConfig;
use chat_filter::roster::RosterStore;
use chat_filter::tasks::Orchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("Chat Filter v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API:       http://{}:{}/api/analysis", config.host, config.port);
    eprintln!("   Push:      ws://{}:{}/ws/analysis", config.host, config.port);
    eprintln!("   Datasets:  {}", config.data_dir.display());
    eprintln!("   Roster:    {}", config.roster_path.display());
    eprintln!("   Workers:   {}\n", config.max_concurrent_analysis);

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

    let roster = RosterStore::open(&config.roster_path)
        .await
        .context("failed to load staff roster")?;
    let orchestrator = Orchestrator::new(&config, Arc::new(roster));

    let state = AppState {
        orchestrator,
        data_dir: config.data_dir.clone(),
    };
    let app = api::router(state, &config.allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(address = %addr, "Chat filter server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
