/// OpenAPI documentation for the Dadspace chat service.
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::models::{
    Conversation, ConversationKind, ConversationMember, MemberRole, Message, ReactionEntry,
};
use crate::routes::conversations::{
    ConversationView, CreateDirectRequest, CreateGroupRequest, GroupMemberRequest,
};
use crate::routes::messages::SendMessageRequest;
use crate::routes::reactions::{ToggleReactionRequest, ToggleReactionResponse};
use crate::routes::unread::TotalUnreadResponse;
use crate::store::ReadReceipt;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Dadspace Chat Service API",
        version = "1.0.0",
        description = "Conversations, messages, reactions and unread tracking for Dadspace",
        contact(name = "Dadspace Team", email = "team@dadspace.dev"),
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8085", description = "Development server"),
        (url = "https://api.dadspace.dev/chat", description = "Production server"),
    ),
    paths(
        crate::routes::conversations::list_conversations,
        crate::routes::conversations::create_direct,
        crate::routes::conversations::create_group,
        crate::routes::conversations::get_conversation,
        crate::routes::conversations::mark_read,
        crate::routes::messages::get_message_history,
        crate::routes::messages::send_message,
        crate::routes::reactions::toggle_reaction,
        crate::routes::unread::total_unread,
    ),
    components(schemas(
        Conversation,
        ConversationKind,
        ConversationMember,
        MemberRole,
        ConversationView,
        CreateDirectRequest,
        CreateGroupRequest,
        GroupMemberRequest,
        Message,
        ReactionEntry,
        ReadReceipt,
        SendMessageRequest,
        ToggleReactionRequest,
        ToggleReactionResponse,
        TotalUnreadResponse,
    )),
    tags(
        (name = "Conversations", description = "Conversation directory"),
        (name = "Messages", description = "Per-conversation message stream"),
        (name = "Reactions", description = "Per-message emoji toggles"),
        (name = "Unread", description = "Unread ledger aggregates"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
