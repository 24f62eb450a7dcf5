//! Health check endpoints
//!
//! - /health, /healthz - Liveness probe (is the service running?)
//! - /version - Build info for deployment verification
//!
//! Liveness reports MongoDB reachability but returns 200 regardless; in dev
//! mode the service can run without a database for UI work against the
//! public routes.

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::helpers::{json_response, FullBody};
use crate::server::AppState;

/// Health response for probes and the admin dashboard status tile
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub mode: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub database: DatabaseHealth,
}

/// Database connection status
#[derive(Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
}

/// GET /health - liveness probe
pub async fn health_check(state: Arc<AppState>) -> Response<FullBody> {
    let connected = match &state.mongo {
        Some(mongo) => mongo.ping().await,
        None => false,
    };

    let response = HealthResponse {
        healthy: true,
        status: if connected { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started.elapsed().as_secs(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        database: DatabaseHealth { connected },
    };

    json_response(StatusCode::OK, &response)
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub name: &'static str,
    pub version: &'static str,
}

/// GET /version
pub fn version_info() -> Response<FullBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
