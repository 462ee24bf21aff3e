use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::{Conversation, ConversationKind, ConversationMember, MemberProfile};
use crate::state::AppState;
use crate::store::ReadReceipt;

// ============================================
// DTOs
// ============================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDirectRequest {
    /// The other participant.
    pub user_id: Uuid,
    /// Partner display snapshot, as known to the caller's client.
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GroupMemberRequest {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
    pub icon: Option<String>,
    pub members: Vec<GroupMemberRequest>,
}

/// A conversation as one viewer sees it: groups show their own name and
/// icon, direct conversations show the partner's snapshot, and the unread
/// count is the viewer's own.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationView {
    pub id: Uuid,
    pub kind: ConversationKind,
    pub display_name: Option<String>,
    pub display_icon: Option<String>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub unread_count: i32,
    pub members: Vec<ConversationMember>,
}

impl ConversationView {
    pub fn for_viewer(conversation: Conversation, viewer: Uuid) -> Self {
        let (display_name, display_icon) = conversation.display_for(viewer);
        let unread_count = conversation.unread_for(viewer);
        Self {
            id: conversation.id,
            kind: conversation.kind,
            display_name,
            display_icon,
            last_message_preview: conversation.last_message_preview,
            last_message_at: conversation.last_message_at,
            created_at: conversation.created_at,
            unread_count,
            members: conversation.members,
        }
    }
}

impl From<GroupMemberRequest> for MemberProfile {
    fn from(member: GroupMemberRequest) -> Self {
        MemberProfile {
            user_id: member.user_id,
            display_name: member.display_name,
            avatar_url: member.avatar_url,
        }
    }
}

// ============================================
// Handlers
// ============================================

/// List the caller's conversations, newest activity first.
#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Conversations",
    responses(
        (status = 200, description = "Conversations for the caller", body = [ConversationView]),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = []))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ConversationView>>, AppError> {
    let conversations = state.chat.list_conversations(user.id).await?;
    let views = conversations
        .into_iter()
        .map(|c| ConversationView::for_viewer(c, user.id))
        .collect();
    Ok(Json(views))
}

/// Resolve or create the direct conversation with another user. 201 when
/// this call created it, 200 when it already existed.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/direct",
    tag = "Conversations",
    request_body = CreateDirectRequest,
    responses(
        (status = 201, description = "Direct conversation created", body = ConversationView),
        (status = 200, description = "Existing direct conversation returned", body = ConversationView),
        (status = 400, description = "Self-DM"),
    ),
    security(("bearer" = []))
)]
pub async fn create_direct(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateDirectRequest>,
) -> Result<(StatusCode, Json<ConversationView>), AppError> {
    let partner = MemberProfile {
        user_id: body.user_id,
        display_name: body.display_name,
        avatar_url: body.avatar_url,
    };
    let (conversation, created) = state.chat.create_or_get_dm(&user.profile(), &partner).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ConversationView::for_viewer(conversation, user.id))))
}

/// Create a group chat. The caller becomes the owner.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/group",
    tag = "Conversations",
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = ConversationView),
        (status = 400, description = "Blank name or empty member list"),
    ),
    security(("bearer" = []))
)]
pub async fn create_group(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<ConversationView>), AppError> {
    let members: Vec<MemberProfile> = body.members.into_iter().map(Into::into).collect();
    let conversation = state
        .chat
        .create_group_chat(&user.profile(), &body.name, body.icon.as_deref(), &members)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ConversationView::for_viewer(conversation, user.id)),
    ))
}

/// Fetch one conversation; members only.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}",
    tag = "Conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "The conversation", body = ConversationView),
        (status = 403, description = "Caller is not a member"),
        (status = 404, description = "No such conversation"),
    ),
    security(("bearer" = []))
)]
pub async fn get_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ConversationView>, AppError> {
    let conversation = state.chat.get_conversation(conversation_id, user.id).await?;
    Ok(Json(ConversationView::for_viewer(conversation, user.id)))
}

/// Zero the caller's unread count and stamp their read time. Idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/read",
    tag = "Conversations",
    params(("id" = Uuid, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Read receipt", body = ReadReceipt),
        (status = 403, description = "Caller is not a member"),
    ),
    security(("bearer" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ReadReceipt>, AppError> {
    let receipt = state.chat.mark_read(conversation_id, user.id).await?;
    Ok(Json(receipt))
}
