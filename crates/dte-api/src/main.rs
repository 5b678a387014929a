//! # dte-api — Binary Entry Point
//!
//! Wires configuration from the environment, picks Postgres or in-memory
//! stores, starts the status poller, and serves the API.

use std::sync::Arc;

use anyhow::Context;
use dte_api::middleware::metrics::ApiMetrics;
use dte_api::state::{AppConfig, AppState};
use dte_authority::{AuthorityConfig, HttpAuthorityClient};
use dte_core::{Clock, SystemClock};
use dte_crypto::{CredentialStore, FileCredentialStore};
use dte_issuance::{
    db, spawn_status_poller, CredentialConfig, IssuanceConfig, IssuanceMetrics, IssuanceService, IssuanceStores,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("DTE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let authority = AuthorityConfig::from_env()?;
    let issuance = IssuanceConfig::from_env()?;
    let credential_dir = CredentialConfig::from_env().dir;
    tracing::info!(credentials = %credential_dir.display(), authority = %authority.base_url, "configuration loaded");

    let credentials: Arc<dyn CredentialStore> = Arc::new(FileCredentialStore::new(credential_dir));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Absent DATABASE_URL means in-memory stores.
    let stores = match db::init_pool().await.context("database initialization failed")? {
        Some(pool) => IssuanceStores::postgres(pool, credentials),
        None => IssuanceStores::in_memory(credentials, clock.clone()),
    };

    let api = Arc::new(HttpAuthorityClient::new(authority.clone())?);
    let service = Arc::new(IssuanceService::new(
        stores,
        api,
        &authority,
        issuance.clone(),
        clock,
        IssuanceMetrics::new()?,
    ));
    let poller = spawn_status_poller(service.clone(), issuance.poll_interval());

    let app = dte_api::app(AppState::new(service, ApiMetrics::new()?));
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!("DTE API listening on {}", config.bind);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    poller.abort();
    Ok(())
}
