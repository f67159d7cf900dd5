use anyhow::Result;
use tamper_service::{
    api::{self, ApiState},
    config::AppConfig,
    metrics_server, observability,
};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let app = api::router(ApiState {
        thresholds: cfg.thresholds,
        workers: cfg.engine.workers,
        max_request_readings: cfg.http.max_request_readings,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.http.bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {e}", cfg.http.bind_addr))?;
    tracing::info!(
        addr = %cfg.http.bind_addr,
        drop_threshold = cfg.thresholds.drop_threshold,
        permanent_threshold = cfg.thresholds.permanent_threshold,
        building_threshold = cfg.thresholds.building_threshold,
        workers = cfg.engine.workers,
        "tamper detection API listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
