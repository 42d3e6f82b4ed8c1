//! Axum API server binary.

use std::net::SocketAddr;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vfetch_api::{create_router, metrics, ApiConfig, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "vfetch=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    info!("Starting vfetch-api");

    let config = ApiConfig::from_env();
    info!(
        "API config: host={}, port={}, downloads_dir={}, production={}, trust_proxy_headers={}",
        config.host,
        config.port,
        config.downloads_dir.display(),
        config.is_production(),
        config.trust_proxy_headers
    );
    if config.is_production() && config.cors_origins.iter().any(|o| o == "*") {
        warn!("CORS allows any origin in production; set CORS_ORIGINS");
    }

    let state = AppState::new(config.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create application state: {}", e))?;

    if let Err(e) = state.worker.downloader().check_available() {
        warn!("Download tool is not available yet, jobs will fail: {}", e);
    }

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
