//! HTTP server for health and state endpoints
//!
//! Read-only, unauthenticated, intended for trusted-network polling:
//! - GET /healthz - condensed liveness/status view
//! - GET /state   - condensed view plus the raw persisted state
//! - GET /version - service version and current time
//! - GET /metrics - Prometheus metrics
//!
//! The snapshot always reflects the most recently persisted state; the
//! orchestrator refreshes it after every tick, independent of request
//! timing.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::metrics::Metrics;
use crate::state::RelayerState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Static runtime facts established at startup.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub mode: String,
    pub contracts: ContractsInfo,
    pub rpc: RpcInfo,
    pub state_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractsInfo {
    pub source_bridge: String,
    pub target_bridge: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcInfo {
    pub source: Vec<String>,
    pub target: Vec<String>,
}

/// Timestamps and error of the most recent tick activity.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastActivity {
    pub forward_at: Option<DateTime<Utc>>,
    pub reverse_at: Option<DateTime<Utc>>,
    pub error_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Endpoint-pool survival counts.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointCounts {
    pub source_alive: usize,
    pub source_total: usize,
    pub target_alive: usize,
    pub target_total: usize,
}

/// Everything the health surface needs, refreshed after every persisted tick.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub runtime: RuntimeInfo,
    pub last: LastActivity,
    pub endpoints: EndpointCounts,
    pub state: RelayerState,
}

pub type SharedHealth = Arc<RwLock<HealthSnapshot>>;

#[derive(Clone)]
struct AppState {
    health: SharedHealth,
    metrics: Arc<Metrics>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CursorSummary {
    next_block: u64,
    last_seen_block: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateSummary {
    file: String,
    updated_at: Option<DateTime<Utc>>,
    forward: CursorSummary,
    reverse: CursorSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
    time: DateTime<Utc>,
    mode: String,
    contracts: ContractsInfo,
    rpc: RpcInfo,
    endpoints: EndpointCounts,
    state: StateSummary,
    last: LastActivity,
}

#[derive(Serialize)]
struct StateResponse {
    #[serde(flatten)]
    health: HealthzResponse,
    raw: RelayerState,
}

#[derive(Serialize)]
struct VersionResponse {
    version: &'static str,
    time: DateTime<Utc>,
}

fn condensed(snapshot: &HealthSnapshot) -> HealthzResponse {
    HealthzResponse {
        status: "ok",
        version: VERSION,
        time: Utc::now(),
        mode: snapshot.runtime.mode.clone(),
        contracts: snapshot.runtime.contracts.clone(),
        rpc: snapshot.runtime.rpc.clone(),
        endpoints: snapshot.endpoints.clone(),
        state: StateSummary {
            file: snapshot.runtime.state_file.clone(),
            updated_at: snapshot.state.updated_at,
            forward: CursorSummary {
                next_block: snapshot.state.forward.cursor.next_block,
                last_seen_block: snapshot.state.forward.cursor.last_seen_block,
            },
            reverse: CursorSummary {
                next_block: snapshot.state.reverse.cursor.next_block,
                last_seen_block: snapshot.state.reverse.cursor.last_seen_block,
            },
        },
        last: snapshot.last.clone(),
    }
}

async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    let snapshot = state.health.read().await;
    Json(condensed(&snapshot))
}

async fn full_state(State(state): State<AppState>) -> Json<StateResponse> {
    let snapshot = state.health.read().await;
    Json(StateResponse {
        health: condensed(&snapshot),
        raw: snapshot.state.clone(),
    })
}

async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: VERSION,
        time: Utc::now(),
    })
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

/// Start the health server. Runs until the process exits.
pub async fn start_server(
    bind_address: &str,
    port: u16,
    health: SharedHealth,
    metrics: Arc<Metrics>,
) -> eyre::Result<()> {
    let state = AppState { health, metrics };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/state", get(full_state))
        .route("/version", get(version))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state);

    let addr: SocketAddr = format!("{bind_address}:{port}")
        .parse()
        .map_err(|e| eyre!("Invalid bind address {bind_address}:{port}: {e}"))?;
    info!("Health server listening on {}", addr);
    info!("  /healthz - condensed status (JSON)");
    info!("  /state   - status + raw persisted state");
    info!("  /version - service version");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
