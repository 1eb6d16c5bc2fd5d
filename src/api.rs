use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::config::{ScheduleConfig, StartOverrides};
use crate::error::SchedulerError;
use crate::metrics::Metrics;
use crate::scheduler::{RunState, Scheduler};
use crate::store::LogStore;
use crate::types::InteractionRecord;

pub const DEFAULT_INTERACTIONS_LIMIT: usize = 150;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn LogStore>,
    /// Base schedule that `/start` overrides are layered onto.
    pub defaults: Arc<ScheduleConfig>,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>, defaults: ScheduleConfig) -> Self {
        let store = scheduler.cycle().store().clone();
        Self {
            scheduler,
            store,
            defaults: Arc::new(defaults),
        }
    }
}

/// Control surface. `/metrics` is mounted only when a recorder is supplied.
pub fn router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/interactions", get(interactions).delete(clear_interactions))
        .with_state(state);
    let app = match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    };
    app.layer(CorsLayer::very_permissive())
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: msg.into() })).into_response()
}

async fn status(State(state): State<AppState>) -> Json<RunState> {
    Json(state.scheduler.status())
}

// An empty body means "start with the configured defaults".
async fn start(State(state): State<AppState>, body: Bytes) -> Response {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        StartOverrides::default()
    } else {
        match serde_json::from_slice::<StartOverrides>(&body) {
            Ok(o) => o,
            Err(e) => return error(StatusCode::BAD_REQUEST, format!("invalid body: {e}")),
        }
    };
    let config = overrides.apply(state.defaults.as_ref().clone());
    match state.scheduler.start(config) {
        Ok(()) => (StatusCode::ACCEPTED, Json(state.scheduler.status())).into_response(),
        Err(e @ (SchedulerError::AlreadyRunning | SchedulerError::InvalidTransition(_))) => {
            error(StatusCode::CONFLICT, e.to_string())
        }
        Err(e @ SchedulerError::InvalidConfig(_)) => error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn stop(State(state): State<AppState>) -> (StatusCode, Json<RunState>) {
    state.scheduler.stop();
    (StatusCode::ACCEPTED, Json(state.scheduler.status()))
}

#[derive(Deserialize)]
struct InteractionsQuery {
    limit: Option<usize>,
}

async fn interactions(
    State(state): State<AppState>,
    Query(q): Query<InteractionsQuery>,
) -> Result<Json<Vec<InteractionRecord>>, Response> {
    let limit = q.limit.unwrap_or(DEFAULT_INTERACTIONS_LIMIT);
    let recent = state.store.query_recent(limit).await.map_err(|e| {
        tracing::warn!(error = %e, "reading interaction log failed");
        error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(recent))
}

async fn clear_interactions(State(state): State<AppState>) -> Response {
    match state.store.clear().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "clearing interaction log failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
