use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::ReactionEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToggleReactionResponse {
    pub message_id: Uuid,
    /// True when the flip added the caller's reaction, false when it removed
    /// it.
    pub added: bool,
    /// The message's converged reaction list after the flip.
    pub reactions: Vec<ReactionEntry>,
}

/// Toggle the caller's reaction on a message: adds the emoji membership if
/// absent, removes it if present. An entry whose last user leaves disappears
/// from the list entirely.
#[utoipa::path(
    post,
    path = "/api/v1/messages/{id}/reactions",
    tag = "Reactions",
    params(("id" = Uuid, Path, description = "Message id")),
    request_body = ToggleReactionRequest,
    responses(
        (status = 200, description = "Reaction state after the flip", body = ToggleReactionResponse),
        (status = 400, description = "Invalid emoji"),
        (status = 403, description = "Caller is not a member of the message's conversation"),
        (status = 404, description = "No such message"),
    ),
    security(("bearer" = []))
)]
pub async fn toggle_reaction(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(message_id): Path<Uuid>,
    Json(body): Json<ToggleReactionRequest>,
) -> Result<Json<ToggleReactionResponse>, AppError> {
    let outcome = state
        .chat
        .toggle_reaction(message_id, user.id, &body.emoji)
        .await?;
    Ok(Json(ToggleReactionResponse {
        message_id,
        added: outcome.added,
        reactions: outcome.message.reactions,
    }))
}
