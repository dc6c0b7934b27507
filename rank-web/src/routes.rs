use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Query, State},
    http::header,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rank_core::{
    find_tracked, RankedPost, RankingService, RefreshStatus, SnapshotStats, TrackedPosition,
    TriggerOutcome,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::render::{render_csv, render_leaderboard};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RankingService>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(leaderboard))
        .route("/health", get(health))
        .route("/api/data", get(get_data))
        .route("/api/status", get(get_status))
        .route("/api/stats", get(get_stats))
        .route("/api/tracked", get(get_tracked))
        .route("/api/refresh", post(trigger_refresh))
        .route("/api/export.csv", get(export_csv))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Default, Deserialize)]
struct DataQuery {
    filter: Option<String>,
}

#[derive(Serialize)]
struct DataResponse {
    scraped_at: Option<DateTime<Utc>>,
    status: RefreshStatus,
    stats: SnapshotStats,
    tracked: Option<TrackedPosition>,
    posts: Vec<RankedPost>,
}

/// Everything the dashboard needs, read from a single snapshot.
async fn get_data(
    State(state): State<AppState>,
    Query(query): Query<DataQuery>,
) -> Result<Json<DataResponse>, AppError> {
    let competition_only = match query.filter.as_deref() {
        None | Some("") | Some("all") => false,
        Some("competition") => true,
        Some(other) => return Err(AppError::BadRequest(format!("unknown filter: {other}"))),
    };

    let snapshot = state.service.snapshot().await;
    let status = state.service.status().await;
    let tracked = find_tracked(&snapshot, state.service.classifier().locator());

    // Ranks stay global when filtering
    let posts = snapshot
        .ranked()
        .filter(|p| !competition_only || p.post.is_competition)
        .collect();

    Ok(Json(DataResponse {
        scraped_at: snapshot.scraped_at,
        status,
        stats: snapshot.stats(),
        tracked,
        posts,
    }))
}

async fn get_status(State(state): State<AppState>) -> Json<RefreshStatus> {
    Json(state.service.status().await)
}

async fn get_stats(State(state): State<AppState>) -> Json<SnapshotStats> {
    Json(state.service.stats().await)
}

async fn get_tracked(State(state): State<AppState>) -> Json<Option<TrackedPosition>> {
    Json(state.service.tracked().await)
}

#[derive(Serialize)]
struct RefreshResponse {
    status: TriggerOutcome,
}

async fn trigger_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let status = state.service.trigger().await;
    tracing::info!(?status, "manual refresh requested");
    Json(RefreshResponse { status })
}

async fn export_csv(State(state): State<AppState>) -> Result<Response, AppError> {
    let snapshot = state.service.snapshot().await;
    let stamp = snapshot
        .scraped_at
        .unwrap_or_else(Utc::now)
        .format("%Y%m%d_%H%M%S");

    Response::builder()
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"leaderboard_{stamp}.csv\""),
        )
        .body(Body::from(render_csv(&snapshot)))
        .map_err(|e| AppError::Internal(e.to_string()))
}

async fn leaderboard(State(state): State<AppState>) -> String {
    let snapshot = state.service.snapshot().await;
    let status = state.service.status().await;
    let tracked = find_tracked(&snapshot, state.service.classifier().locator());
    render_leaderboard(&snapshot, tracked.as_ref(), &status)
}
