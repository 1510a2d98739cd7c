//! Filter rule toggles and staff roster administration.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::config::FilterRules;
use crate::roster::extract_staff;
use crate::source::{FileSource, RecordSource};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/config/filter-rules",
            get(get_filter_rules).put(put_filter_rules),
        )
        .route(
            "/api/config/staff-list",
            get(get_staff_list).put(put_staff_list),
        )
        .route("/api/config/staff-list/add", post(add_staff))
        .route("/api/config/staff-list/import", post(import_staff))
        .route("/api/config/staff-list/{nick_name}", delete(remove_staff))
}

// ── Filter rules ────────────────────────────────────────────────────────

async fn get_filter_rules(State(state): State<AppState>) -> impl IntoResponse {
    let rules = state.orchestrator.rules().await;
    Json(json!({
        "rules": rules,
        "config": state.orchestrator.filter_config(),
    }))
}

async fn put_filter_rules(
    State(state): State<AppState>,
    Json(rules): Json<FilterRules>,
) -> impl IntoResponse {
    state.orchestrator.set_rules(rules).await;
    Json(json!({"rules": rules}))
}

// ── Staff roster ────────────────────────────────────────────────────────

async fn get_staff_list(State(state): State<AppState>) -> impl IntoResponse {
    let names = state.orchestrator.roster().list().await;
    Json(json!({"count": names.len(), "staff_list": names}))
}

#[derive(Deserialize)]
struct StaffListRequest {
    staff_list: Vec<String>,
}

async fn put_staff_list(
    State(state): State<AppState>,
    Json(body): Json<StaffListRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let names = state.orchestrator.roster().replace(body.staff_list).await?;
    Ok(Json(json!({"count": names.len(), "staff_list": names})))
}

#[derive(Deserialize)]
struct AddStaffRequest {
    nick_name: String,
}

async fn add_staff(
    State(state): State<AppState>,
    Json(body): Json<AddStaffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = state.orchestrator.roster().add(&body.nick_name).await?;
    Ok((StatusCode::CREATED, Json(json!({"nick_name": name}))))
}

async fn remove_staff(
    State(state): State<AppState>,
    Path(nick_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.roster().remove(&nick_name).await?;
    Ok(Json(json!({"nick_name": nick_name, "status": "removed"})))
}

#[derive(Deserialize)]
struct ImportRequest {
    dataset: String,
}

/// Replace the roster with the storefront staff found in a chat dataset.
async fn import_staff(
    State(state): State<AppState>,
    Json(body): Json<ImportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let source = FileSource::in_dir(&state.data_dir, &body.dataset)?;
    let dataset = source.open().await?;

    let found = extract_staff(&dataset.rows, state.orchestrator.filter_config());
    if found.is_empty() {
        return Err(ApiError::invalid_input(format!(
            "No staff nicknames found in {}",
            dataset.name
        )));
    }

    let names = state.orchestrator.roster().replace(found).await?;
    info!(dataset = %dataset.name, staff = names.len(), "Roster imported from dataset");
    Ok(Json(json!({
        "dataset": dataset.name,
        "count": names.len(),
        "staff_list": names,
    })))
}
