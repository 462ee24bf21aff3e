use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::Message;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub text: String,
    /// Client-generated key for safe retries: a resend carrying the same key
    /// returns the originally appended message instead of duplicating it.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Page size, default 50, max 100.
    pub limit: Option<i64>,
    /// Exclusive message-id cursor: return messages strictly older than it.
    pub before: Option<Uuid>,
}

/// Ascending page of a conversation's history; members only.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Messages",
    params(
        ("id" = Uuid, Path, description = "Conversation id"),
        HistoryParams,
    ),
    responses(
        (status = 200, description = "Messages ascending by sent time", body = [Message]),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "Unknown cursor"),
    ),
    security(("bearer" = []))
)]
pub async fn get_message_history(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<Message>>, AppError> {
    let messages = state
        .chat
        .messages(conversation_id, user.id, params.limit, params.before)
        .await?;
    Ok(Json(messages))
}

/// Append a message. 201 for a fresh append, 200 for an idempotency-key
/// replay of an earlier send.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Messages",
    params(("id" = Uuid, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message appended", body = Message),
        (status = 200, description = "Replay of an earlier send", body = Message),
        (status = 400, description = "Empty or oversized text"),
        (status = 403, description = "Caller is not a member"),
    ),
    security(("bearer" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let outcome = state
        .chat
        .send_message(
            conversation_id,
            &user.profile(),
            &body.text,
            body.idempotency_key,
        )
        .await?;
    let status = if outcome.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.message)))
}
