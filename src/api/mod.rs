//! HTTP + WebSocket surface.

pub mod analysis;
pub mod settings;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, warn};

use crate::error::{RosterError, SourceError, TaskError};
use crate::tasks::Orchestrator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Directory `dataset` names are resolved against.
    pub data_dir: PathBuf,
}

/// Build the full router: analysis, configuration and push routes.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(analysis::routes())
        .merge(settings::routes())
        .merge(ws::routes())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "chat-filter",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Error body: `{ "error_code", "error_message" }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_input",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(error = %message, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal_error",
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error_code": self.code,
                "error_message": self.message,
            })),
        )
            .into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        let status = match &e {
            TaskError::NotFound { .. } | TaskError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            TaskError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TaskError::NotReady { .. } | TaskError::InvalidTransition { .. } => StatusCode::CONFLICT,
            TaskError::Failure { .. } => return Self::internal(e.to_string()),
        };
        Self {
            status,
            code: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<RosterError> for ApiError {
    fn from(e: RosterError) -> Self {
        match e {
            RosterError::Duplicate(_) | RosterError::BlankName => Self::invalid_input(e.to_string()),
            RosterError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: e.to_string(),
            },
            RosterError::Io(_) | RosterError::Json(_) => Self::internal(e.to_string()),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: e.to_string(),
            },
            SourceError::UnsupportedFormat(_) | SourceError::Malformed { .. } => {
                Self::invalid_input(e.to_string())
            }
            SourceError::Io(_) => Self::internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn task_errors_map_to_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(ApiError::from(TaskError::NotFound { id }).status, StatusCode::NOT_FOUND);
        let not_ready = ApiError::from(TaskError::NotReady {
            id,
            status: "processing".into(),
        });
        assert_eq!(not_ready.status, StatusCode::CONFLICT);
        assert_eq!(not_ready.code, "not_ready");
        let invalid = ApiError::from(TaskError::InvalidInput("page".into()));
        assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn roster_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(RosterError::Duplicate("a".into())).status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(RosterError::NotFound("a".into())).status,
            StatusCode::NOT_FOUND
        );
    }
}
