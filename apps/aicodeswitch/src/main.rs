use std::sync::Arc;

use clap::Parser;
use tracing::info;

mod cli;
mod seed;

use aicodeswitch_core::ProxyEngine;
use aicodeswitch_storage::{InMemoryConfigStore, InMemoryLogSink};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_filter);

    if let Err(err) = run(cli).await {
        tracing::error!(error = %err, "aicodeswitch failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let mut config_store = match &cli.seed {
        Some(path) => seed::load(path)?,
        None => InMemoryConfigStore::new(),
    };
    if let Some(api_key) = &cli.api_key {
        use aicodeswitch_storage::ConfigStore as _;
        let mut app_config = config_store.get_config().await?;
        app_config.api_key = api_key.clone();
        config_store = config_store.with_app_config(app_config);
    }
    let config_store: Arc<dyn aicodeswitch_storage::ConfigStore> = Arc::new(config_store);
    let log_sink: Arc<dyn aicodeswitch_storage::LogSink> = Arc::new(InMemoryLogSink::new());

    let http_client = wreq::Client::new();
    let engine = Arc::new(ProxyEngine::new(config_store, log_sink, http_client));
    engine.reload().await?;
    info!("routing snapshot loaded");

    let app = aicodeswitch_core::router(engine.clone());

    let bind = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining in-flight requests");
}

fn init_tracing(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
