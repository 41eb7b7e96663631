use crate::error::ApiError;
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, Query, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tpa_core::model::RunSummary;
use tpa_core::query::{QueryService, RunDetail};
use tpa_core::{AssessmentBridge, BridgeConfig, CreatedRun, QueryError, Stage};

static RID: AtomicU64 = AtomicU64::new(1);

fn next_rid() -> String {
    let n = RID.fetch_add(1, Ordering::Relaxed);
    format!("r-{n:06}")
}

#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<AssessmentBridge>,
    pub enabled: bool,
}

impl AppState {
    pub fn new(bridge: AssessmentBridge, enabled: bool) -> Self {
        Self {
            bridge: Arc::new(bridge),
            enabled,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let assistant = Router::new()
        .route("/assessments", post(create_run).get(list_runs))
        .route("/assessments/:id", get(show_run))
        .route("/overlays/:id", get(show_overlay))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_enabled));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/assistant", assistant)
        .with_state(state)
}

pub async fn run(cfg: BridgeConfig) -> Result<()> {
    let bridge = AssessmentBridge::from_config(&cfg)?;
    let state = AppState::new(bridge, cfg.enabled);
    let addr: SocketAddr = cfg.bind.parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        event = "listening",
        addr = %addr,
        enabled = cfg.enabled,
        engine_url = %cfg.engine_url
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(event = "server_stop");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(event = "signal_handler_failed", error = %e);
        std::future::pending::<()>().await;
    }
}

async fn require_enabled(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.enabled {
        tracing::info!(
            event = "request_forbidden",
            method = %req.method(),
            path = %req.uri().path()
        );
        return Err(ApiError::forbidden());
    }
    Ok(next.run(req).await)
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "enabled": state.enabled }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateParams {
    #[serde(default, deserialize_with = "tpa_core::cases::opt_id_string")]
    pub case_id: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
}

/// Parameters come from the query string, a JSON body, or both; the body
/// wins per field.
async fn create_run(
    State(state): State<AppState>,
    Query(query): Query<CreateParams>,
    body: Bytes,
) -> Result<Json<CreatedRun>, ApiError> {
    let rid = next_rid();
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        CreateParams::default()
    } else {
        serde_json::from_slice::<CreateParams>(&body)
            .map_err(|e| ApiError::invalid(format!("invalid request body: {e}")))?
    };

    let case_id = from_body.case_id.or(query.case_id);
    let stage = from_body
        .stage
        .or(query.stage)
        .map(|s| Stage::parse(&s))
        .unwrap_or_default();

    tracing::info!(event = "http_create", rid = %rid, case_id = ?case_id, stage = %stage);
    let created = state
        .bridge
        .create(case_id.as_deref(), stage)
        .await
        .map_err(ApiError::internal)?;
    tracing::info!(event = "http_create_done", rid = %rid, run_id = created.id);
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default, deserialize_with = "tpa_core::cases::opt_id_string")]
    pub case_id: Option<String>,
}

async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RunSummary>>, ApiError> {
    let case_id = params.case_id.clone();
    let runs = read(&state, move |q| q.list(case_id.as_deref())).await?;
    tracing::debug!(event = "http_list", case_id = ?params.case_id, count = runs.len());
    Ok(Json(runs))
}

async fn show_run(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<RunDetail>, ApiError> {
    let id = parse_id(&raw_id)?;
    Ok(Json(read(&state, move |q| q.get(id)).await?))
}

async fn show_overlay(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&raw_id)?;
    Ok(Json(read(&state, move |q| q.overlay(id)).await?))
}

/// Store reads take a blocking mutex; run them off the async workers.
async fn read<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(QueryService) -> Result<T, QueryError> + Send + 'static,
{
    let query = state.bridge.query();
    tokio::task::spawn_blocking(move || f(query))
        .await
        .map_err(|e| ApiError::internal(anyhow::anyhow!("read task failed: {e}")))?
        .map_err(ApiError::from)
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::invalid(format!("run id must be an integer, got {raw:?}")))
}
