//! REST endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, AppState};
use crate::pipeline::HistoryMessage;
use crate::store::NewDraft;

const DEFAULT_LIMIT: i64 = 100;

/// Build the REST routes.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/emails/", get(list_emails))
        .route("/emails/{id}", get(get_email).delete(delete_email))
        .route("/emails/{id}/process", post(process_email))
        .route("/emails/{id}/chat", post(chat_email))
        .route("/emails/{id}/draft", put(save_draft_reply))
        .route("/emails/{id}/read", post(mark_read))
        .route("/process-emails/", post(process_all_emails))
        .route("/reset-db", post(reset_db))
        .route("/prompts/", get(list_prompts))
        .route("/prompts/{id}", put(update_prompt))
        .route("/drafts/", get(list_drafts).post(create_draft))
        .route("/drafts/generate", post(generate_draft))
        .route("/drafts/{id}", delete(delete_draft))
        .route("/usage", get(usage))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    Json(json!({"message": "Email Productivity Agent API is running"}))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "inbox-agent",
    }))
}

// ── Emails ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListParams {
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn list_emails(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let emails = state
        .services
        .db
        .list_emails(params.skip.unwrap_or(0), params.limit.unwrap_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(emails))
}

async fn get_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let email = state
        .services
        .db
        .get_email(id)
        .await?
        .ok_or(ApiError::NotFound("Email"))?;
    Ok(Json(email))
}

async fn delete_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.services.db.delete_email(id).await? {
        return Err(ApiError::NotFound("Email"));
    }
    info!(id, "Email deleted");
    Ok(Json(json!({"message": "Email deleted successfully"})))
}

async fn process_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.services.pipeline.process_email(id).await?;
    Ok(Json(outcome.into_email()))
}

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    #[serde(default)]
    history: Vec<HistoryMessage>,
}

async fn chat_email(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = state
        .services
        .db
        .get_email(id)
        .await?
        .ok_or(ApiError::NotFound("Email"))?;
    let response = state
        .services
        .chat
        .respond(&email, &body.query, &body.history)
        .await?;
    Ok(Json(json!({"response": response})))
}

#[derive(Deserialize)]
struct DraftReplyRequest {
    body: String,
}

async fn save_draft_reply(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<DraftReplyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = state
        .services
        .db
        .save_suggested_reply(id, &req.body)
        .await?
        .ok_or(ApiError::NotFound("Email"))?;
    Ok(Json(email))
}

#[derive(Deserialize)]
struct ReadRequest {
    is_read: bool,
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = state
        .services
        .db
        .set_email_read(id, req.is_read)
        .await?
        .ok_or(ApiError::NotFound("Email"))?;
    Ok(Json(email))
}

async fn process_all_emails(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let processed = state.services.pipeline.process_all().await?;
    Ok(Json(json!({
        "message": format!("Processed {processed} emails."),
        "processed": processed,
    })))
}

async fn reset_db(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let processed = state.services.reset_inbox().await?;
    Ok(Json(json!({
        "message": "Inbox reset and AI processing complete.",
        "processed": processed,
    })))
}

// ── Prompts ─────────────────────────────────────────────────────────

async fn list_prompts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.db.list_prompts().await?))
}

/// Only `content` is applied; a `prompt_type` in the body is ignored and a
/// prompt never changes role.
#[derive(Deserialize)]
struct PromptUpdate {
    content: String,
}

async fn update_prompt(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<PromptUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let prompt = state
        .services
        .db
        .update_prompt_content(id, &req.content)
        .await?
        .ok_or(ApiError::NotFound("Prompt"))?;
    Ok(Json(prompt))
}

// ── Drafts ──────────────────────────────────────────────────────────

async fn list_drafts(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.db.list_drafts().await?))
}

#[derive(Deserialize)]
struct DraftRequest {
    recipient: String,
    subject: String,
    body: String,
}

async fn create_draft(
    State(state): State<AppState>,
    Json(req): Json<DraftRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = state
        .services
        .db
        .insert_draft(&NewDraft {
            recipient: req.recipient,
            subject: req.subject,
            body: req.body,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(draft)))
}

async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.services.db.delete_draft(id).await? {
        return Err(ApiError::NotFound("Draft"));
    }
    Ok(Json(json!({"message": "Draft deleted successfully"})))
}

#[derive(Deserialize)]
struct GenerateRequest {
    recipient: String,
    subject: String,
    instructions: String,
}

async fn generate_draft(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let body = state
        .services
        .composer
        .generate(&req.recipient, &req.subject, &req.instructions)
        .await?;
    Ok(Json(json!({"body": body})))
}

// ── Usage ───────────────────────────────────────────────────────────

async fn usage(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.services.db.get_total_spend().await?))
}
