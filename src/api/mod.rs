//! HTTP API — axum router over the email, prompt, and draft stores.

pub mod routes;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::{DatabaseError, PipelineError};
use crate::services::Services;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
}

/// Errors returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Pipeline(PipelineError),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        ApiError::Pipeline(e)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        ApiError::Pipeline(PipelineError::Database(e))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::Pipeline(PipelineError::EmailNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Pipeline(PipelineError::Llm(_) | PipelineError::Knowledge(_)) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Pipeline(PipelineError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::NotFound(what) => format!("{what} not found"),
            ApiError::Pipeline(PipelineError::EmailNotFound(_)) => "Email not found".to_string(),
            ApiError::Pipeline(e) => e.to_string(),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %message, "Request rejected");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Build the full application router with CORS and request tracing.
pub fn router(services: Arc<Services>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::api_routes(AppState { services }).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{KnowledgeError, LlmError};

    #[test]
    fn error_status_mapping() {
        assert_eq!(ApiError::NotFound("Prompt").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(PipelineError::EmailNotFound(3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(PipelineError::Llm(LlmError::RequestFailed {
                provider: "groq".into(),
                reason: "offline".into(),
            }))
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(PipelineError::Knowledge(KnowledgeError::SearchFailed {
                reason: "down".into()
            }))
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(DatabaseError::Query("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
