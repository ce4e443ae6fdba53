/*
 * Copyright 2025 ClipSeek
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! REST API over the query engine and builder, implemented with axum.

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::Json as JsonResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::builder::{BuildPhase, IndexBuilder};
use crate::compute::distance::DistanceMetric;
use crate::core::{Config, QueryError};
use crate::ingest::JsonlRecordSource;
use crate::query::{QueryEngine, SearchRequest, SearchResponse};
use crate::storage::{persistence, SnapshotStore};

/// Shared application state for REST handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub builder: Arc<IndexBuilder>,
    pub snapshots: Arc<SnapshotStore>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

/// Generic API response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: Some(message),
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            message: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub snapshot_version: u64,
    pub vector_count: usize,
    pub model_id: Option<String>,
    pub metric: Option<String>,
    pub index_kind: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    pub build_in_progress: bool,
    pub build_phase: BuildPhase,
    pub last_build_failure: Option<String>,
}

/// Query-string form of a search, for `GET /search?q=...`.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    pub metric: Option<String>,
    pub min_score: Option<f32>,
}

/// Create REST router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/search", post(search_post))
        .route("/search", get(search_get))
        .route("/rebuild", post(trigger_rebuild))
        .route("/reload", post(reload_snapshot))
        .with_state(state)
}

/// REST server bound to the configured address.
pub struct RestServer {
    router: Router,
    bind_addr: SocketAddr,
}

impl RestServer {
    pub fn new(bind_addr: SocketAddr, state: AppState) -> Self {
        let router = create_router(state).layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        );
        Self { router, bind_addr }
    }

    /// Serve until the shutdown future resolves.
    pub async fn start(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        info!("🌐 REST server listening on {}", self.bind_addr);
        info!("   GET  /health   - liveness check");
        info!("   GET  /status   - snapshot + build status");
        info!("   POST /search   - semantic search");
        info!("   GET  /search   - semantic search (query string)");
        info!("   POST /rebuild  - trigger corpus rebuild");
        info!("   POST /reload   - reload persisted snapshot");

        axum::Server::bind(&self.bind_addr)
            .serve(self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn health_check() -> JsonResponse<ApiResponse<HashMap<String, String>>> {
    let mut health = HashMap::new();
    health.insert("status".to_string(), "healthy".to_string());
    health.insert("service".to_string(), "clipseek".to_string());
    health.insert(
        "version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    JsonResponse(ApiResponse::success(health))
}

async fn get_status(State(state): State<AppState>) -> JsonResponse<ApiResponse<StatusResponse>> {
    let snapshot = state.snapshots.current();
    let build = state.builder.status();

    let status = if snapshot.is_some() {
        "healthy"
    } else {
        "no_index"
    };

    let response = StatusResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        snapshot_version: state.snapshots.current_version(),
        vector_count: snapshot
            .as_ref()
            .map(|s| s.manifest.vector_count)
            .unwrap_or(0),
        model_id: snapshot.as_ref().map(|s| s.manifest.model_id.clone()),
        metric: snapshot.as_ref().map(|s| s.manifest.metric.to_string()),
        index_kind: snapshot.as_ref().map(|s| s.manifest.index_kind.to_string()),
        built_at: snapshot.as_ref().map(|s| s.manifest.built_at),
        build_in_progress: build.in_progress,
        build_phase: build.phase,
        last_build_failure: build.last_failure,
    };
    JsonResponse(ApiResponse::success(response))
}

async fn search_post(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<JsonResponse<ApiResponse<SearchResponse>>, (StatusCode, JsonResponse<ApiResponse<SearchResponse>>)> {
    run_search(&state, &request).await
}

async fn search_get(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<JsonResponse<ApiResponse<SearchResponse>>, (StatusCode, JsonResponse<ApiResponse<SearchResponse>>)> {
    let metric = match params.metric.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<DistanceMetric>() {
            Ok(metric) => Some(metric),
            Err(e) => {
                return Err((
                    StatusCode::BAD_REQUEST,
                    JsonResponse(ApiResponse::error(e)),
                ))
            }
        },
    };

    let request = SearchRequest {
        query: params.q,
        k: params.k.unwrap_or(5),
        metric,
        min_score: params.min_score,
        filters: Vec::new(),
    };
    run_search(&state, &request).await
}

async fn run_search(
    state: &AppState,
    request: &SearchRequest,
) -> Result<JsonResponse<ApiResponse<SearchResponse>>, (StatusCode, JsonResponse<ApiResponse<SearchResponse>>)> {
    match state.engine.search(request).await {
        Ok(response) => Ok(JsonResponse(ApiResponse::success(response))),
        Err(e) => Err((
            query_error_status(&e),
            JsonResponse(ApiResponse::error(e.to_string())),
        )),
    }
}

fn query_error_status(error: &QueryError) -> StatusCode {
    match error {
        QueryError::Invalid(_) => StatusCode::BAD_REQUEST,
        QueryError::NoSnapshot => StatusCode::SERVICE_UNAVAILABLE,
        QueryError::ModelMismatch { .. } | QueryError::MetricMismatch { .. } => {
            StatusCode::CONFLICT
        }
        QueryError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        QueryError::Embedding(_) | QueryError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
pub struct RebuildAccepted {
    pub corpus: String,
}

/// Kick off a corpus rebuild in the background. Rejected with 409 when
/// a build is already running, not queued.
async fn trigger_rebuild(
    State(state): State<AppState>,
) -> Result<JsonResponse<ApiResponse<RebuildAccepted>>, (StatusCode, JsonResponse<ApiResponse<RebuildAccepted>>)> {
    if state.builder.build_in_progress() {
        return Err((
            StatusCode::CONFLICT,
            JsonResponse(ApiResponse::error(
                "a build is already in progress".to_string(),
            )),
        ));
    }

    let corpus = state.config.storage.corpus_path.clone();
    let builder = state.builder.clone();
    let corpus_display = corpus.display().to_string();

    tokio::spawn(async move {
        let mut source = match JsonlRecordSource::open(&corpus) {
            Ok(source) => source,
            Err(e) => {
                error!(error = %e, "rebuild aborted: cannot open corpus");
                return;
            }
        };
        match builder.build(&mut source).await {
            Ok(report) => info!(
                version = report.snapshot_version,
                indexed = report.indexed,
                skipped = report.skipped.len(),
                "rebuild finished"
            ),
            Err(e) => error!(error = %e, "rebuild failed"),
        }
    });

    Ok(JsonResponse(ApiResponse::success_with_message(
        RebuildAccepted {
            corpus: corpus_display,
        },
        "rebuild started".to_string(),
    )))
}

#[derive(Debug, Serialize)]
pub struct ReloadResult {
    pub snapshot_version: u64,
    pub vector_count: usize,
}

/// Reload the persisted snapshot from disk, e.g. after an out-of-band
/// build. On corruption the currently published snapshot stays active.
async fn reload_snapshot(
    State(state): State<AppState>,
) -> Result<JsonResponse<ApiResponse<ReloadResult>>, (StatusCode, JsonResponse<ApiResponse<ReloadResult>>)> {
    let dir = state.config.storage.index_dir.clone();
    match persistence::load(&dir) {
        Ok((manifest, index, metadata)) => {
            let snapshot = state.snapshots.publish(manifest, index, metadata);
            Ok(JsonResponse(ApiResponse::success(ReloadResult {
                snapshot_version: snapshot.version,
                vector_count: snapshot.manifest.vector_count,
            })))
        }
        Err(e) => {
            error!(error = %e, dir = %dir.display(), "snapshot reload failed, keeping active snapshot");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonResponse(ApiResponse::error(format!(
                    "reload failed, previous snapshot remains active: {}",
                    e
                ))),
            ))
        }
    }
}
