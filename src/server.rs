//! HTTP surface over the pipeline
//!
//! This module exposes the core operations to HTTP clients. It owns no
//! business logic: every handler fetches a batch from the record source
//! and/or calls one pipeline function, then maps the result to JSON.
//!
//! # Routes
//!
//! ```text
//! GET  /health              liveness + version
//! POST /recent              aligned unified rows for a query window
//! POST /sequence?window=N   sliding feature sequences over those rows
//! POST /iss                 Insulin Sensitivity Score from raw series
//! POST /isf                 Insulin Sensitivity Factor from a daily dose
//! POST /dashboard-snapshot  latest row + trailing series + score
//! ```

use crate::error::EngineError;
use crate::pipeline::{self, FeatureEngine};
use crate::scores::ScoreEngine;
use crate::source::{RecentQuery, RecordSource};
use crate::types::{
    DashboardSnapshot, GlucoseUnit, IsfMethod, ScoreComponents, SequenceWindow, UnifiedRow,
    DEFAULT_WINDOW,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
}

impl ServerConfig {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Shared server state
pub struct ServerState {
    /// Supplier of the three record streams
    source: Arc<dyn RecordSource>,
    /// Engine stamping snapshots with provenance
    engine: FeatureEngine,
}

impl ServerState {
    pub fn new(source: Arc<dyn RecordSource>) -> Self {
        Self {
            source,
            engine: FeatureEngine::new(),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Response from the /recent endpoint
#[derive(Serialize)]
pub struct RecentResponse {
    pub count: usize,
    pub rows: Vec<UnifiedRow>,
}

/// Window override for the /sequence endpoint
#[derive(Deserialize)]
pub struct SequenceParams {
    pub window: Option<usize>,
}

/// Response from the /sequence endpoint
#[derive(Serialize)]
pub struct SequenceResponse {
    pub window: usize,
    pub count: usize,
    pub sequences: Vec<SequenceWindow>,
}

/// Raw series submitted for scoring
#[derive(Deserialize)]
pub struct IssRequest {
    pub glucose: Vec<f64>,
    pub insulin_units: Vec<f64>,
    #[serde(default)]
    pub unit: GlucoseUnit,
}

/// Response from the /iss endpoint
#[derive(Serialize)]
pub struct IssResponse {
    pub iss: f64,
    pub components: ScoreComponents,
    pub notes: String,
}

/// Dose submitted for factor calculation
#[derive(Deserialize)]
pub struct IsfRequest {
    #[serde(default)]
    pub method: IsfMethod,
    pub total_daily_dose: f64,
}

/// Response from the /isf endpoint
#[derive(Serialize)]
pub struct IsfResponse {
    pub isf: f64,
    pub unit: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn reject(err: EngineError) -> HandlerError {
    let (status, code) = match &err {
        EngineError::InvalidQuery(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_QUERY"),
        EngineError::WindowOutOfRange { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "WINDOW_OUT_OF_RANGE")
        }
        EngineError::InvalidDose(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_DOSE"),
        EngineError::JsonError(_) => (StatusCode::BAD_REQUEST, "INVALID_JSON"),
        EngineError::SourceError(_) => (StatusCode::BAD_GATEWAY, "SOURCE_ERROR"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

fn fetch_rows(
    state: &ServerState,
    query: &RecentQuery,
) -> Result<Vec<UnifiedRow>, HandlerError> {
    query.validate().map_err(reject)?;
    let batch = state.source.fetch_recent(query).map_err(reject)?;
    let (rows, stats) = pipeline::align_records_counted(&batch, query.unit);
    if stats != crate::aligner::AlignStats::default() {
        tracing::warn!(
            glucose = stats.glucose_skipped,
            activity = stats.activity_skipped,
            insulin = stats.insulin_skipped,
            "dropped records during alignment"
        );
    }
    Ok(rows)
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /recent
async fn recent(
    State(state): State<Arc<ServerState>>,
    Json(query): Json<RecentQuery>,
) -> Result<Json<RecentResponse>, HandlerError> {
    let rows = fetch_rows(&state, &query)?;
    Ok(Json(RecentResponse {
        count: rows.len(),
        rows,
    }))
}

/// POST /sequence?window=6
async fn sequence(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<SequenceParams>,
    Json(query): Json<RecentQuery>,
) -> Result<Json<SequenceResponse>, HandlerError> {
    let window = params.window.unwrap_or(DEFAULT_WINDOW);
    let rows = fetch_rows(&state, &query)?;
    let sequences = pipeline::derive_sequences(&rows, window).map_err(reject)?;
    Ok(Json(SequenceResponse {
        window,
        count: sequences.len(),
        sequences,
    }))
}

/// POST /iss
async fn iss(Json(request): Json<IssRequest>) -> Json<IssResponse> {
    let glucose = ScoreEngine::to_mgdl(&request.glucose, request.unit);
    let result = ScoreEngine::sensitivity_score(&glucose, &request.insulin_units);
    Json(IssResponse {
        iss: result.score,
        components: result.components,
        notes: "Heuristic only.".to_string(),
    })
}

/// POST /isf
async fn isf(Json(request): Json<IsfRequest>) -> Result<Json<IsfResponse>, HandlerError> {
    let factor =
        ScoreEngine::sensitivity_factor(request.method, request.total_daily_dose).map_err(reject)?;
    Ok(Json(IsfResponse {
        isf: factor.value,
        unit: factor.unit,
    }))
}

/// POST /dashboard-snapshot
async fn dashboard_snapshot(
    State(state): State<Arc<ServerState>>,
    Json(query): Json<RecentQuery>,
) -> Result<Json<DashboardSnapshot>, HandlerError> {
    let rows = fetch_rows(&state, &query)?;
    Ok(Json(state.engine.snapshot(&rows)))
}

/// Build the router for the given state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/recent", post(recent))
        .route("/sequence", post(sequence))
        .route("/iss", post(iss))
        .route("/isf", post(isf))
        .route("/dashboard-snapshot", post(dashboard_snapshot))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server.
///
/// Returns the bound address and a sender that triggers graceful shutdown.
pub async fn run(
    config: ServerConfig,
    source: Arc<dyn RecordSource>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(source));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Glykos server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
