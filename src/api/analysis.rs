//! Analysis task endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::error::SourceError;
use crate::pipeline::FilterKind;
use crate::source::{FileSource, RecordSource};
use crate::tasks::DeleteOutcome;
use crate::tasks::index::DEFAULT_PAGE_SIZE;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/start", post(start_analysis))
        .route("/api/analysis/tasks", get(list_tasks))
        .route("/api/analysis/tasks/{id}", get(get_task).delete(delete_task))
        .route("/api/analysis/tasks/{id}/result", get(get_result))
        .route(
            "/api/analysis/tasks/{id}/filter-details/{kind}",
            get(filter_details),
        )
        .route(
            "/api/analysis/tasks/{id}/chat-record/{record_id}",
            get(chat_record),
        )
        .route("/api/analysis/stats", get(stats))
}

fn parse_task_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::invalid_input(format!("Invalid task ID: {id}")))
}

#[derive(Deserialize)]
struct StartRequest {
    dataset: String,
}

/// Resolve `dataset` in the data directory and submit it.
///
/// Missing files and unsupported formats are rejected up front; anything else
/// surfaces later as a failed task.
async fn start_analysis(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = FileSource::in_dir(&state.data_dir, &body.dataset)?;
    source.format()?;
    if !tokio::fs::try_exists(source.path()).await.unwrap_or(false) {
        return Err(SourceError::NotFound(body.dataset).into());
    }

    let dataset = source.name().to_string();
    let task_id = state.orchestrator.submit(Arc::new(source)).await;
    info!(task_id = %task_id, dataset = %dataset, "Analysis requested over HTTP");

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "task_id": task_id,
            "dataset": dataset,
            "status": "pending",
        })),
    ))
}

async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.list_tasks().await)
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.orchestrator.get_status(task_id).await?))
}

async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.orchestrator.get_result(task_id).await?))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&id)?;
    let outcome = state.orchestrator.delete(task_id).await?;
    let status = match outcome {
        DeleteOutcome::Cancelled => "cancelled",
        DeleteOutcome::Removed => "removed",
    };
    Ok(Json(json!({"task_id": task_id, "status": status})))
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default = "first_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn first_page() -> usize {
    1
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

async fn filter_details(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&id)?;
    let kind: FilterKind = kind.parse().map_err(ApiError::invalid_input)?;
    let page = state
        .orchestrator
        .index()
        .query(task_id, kind, params.page, params.page_size)
        .await?;
    Ok(Json(page))
}

async fn chat_record(
    State(state): State<AppState>,
    Path((id, record_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = parse_task_id(&id)?;
    let detail = state
        .orchestrator
        .index()
        .find_by_record_id(task_id, &record_id)
        .await?;
    Ok(Json(detail))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.stats().await)
}
