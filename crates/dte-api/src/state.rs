//! # Application State
//!
//! Shared state handed to every handler: the issuance service and the
//! HTTP request metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use dte_authority::{env_parse, ConfigError};
use dte_issuance::IssuanceService;

use crate::middleware::metrics::ApiMetrics;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Listen address (default: `0.0.0.0:8080`).
    pub bind: SocketAddr,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl AppConfig {
    /// Read `DTE_API_BIND`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind: env_parse("DTE_API_BIND", Self::default().bind)?,
        })
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: Arc<IssuanceService>,
    pub http_metrics: ApiMetrics,
}

impl AppState {
    pub fn new(service: Arc<IssuanceService>, http_metrics: ApiMetrics) -> Self {
        Self { service, http_metrics }
    }
}
