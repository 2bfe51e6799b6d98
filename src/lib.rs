pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod exam;
pub(crate) mod registry;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::registry::SessionStore;
use crate::services::scoring::HttpScoringClient;
use crate::services::testbank::HttpTestBank;
use crate::services::violations::RedisViolationStore;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; violation records stay local");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let testbank = Arc::new(HttpTestBank::from_settings(&settings)?);
    let scoring = Arc::new(HttpScoringClient::from_settings(&settings)?);
    let violations = Arc::new(RedisViolationStore::from_settings(&settings, redis.clone()));
    let state =
        AppState::new(settings, redis.clone(), SessionStore::new(), testbank, scoring, violations);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = tokio::spawn(tasks::sweeper::run(state.clone(), shutdown_rx));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Examhall API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }
    if let Err(err) = sweeper.await {
        tracing::error!(error = %err, "Session sweeper join failed");
    }

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}
