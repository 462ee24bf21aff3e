//! Typed realtime events. Every store mutation that other members can
//! observe produces exactly one event; the WebSocket edge serializes it, the
//! Redis pub/sub edge wraps it in an [`EventEnvelope`] for cross-node fanout.
//!
//! `reaction.updated` carries the full converged entry list after the flip
//! instead of an add/remove delta, so subscribers end at the same state no
//! matter what order concurrent toggles arrive in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, ReactionEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatEvent {
    #[serde(rename = "message.new")]
    MessageNew { message: Message },

    #[serde(rename = "reaction.updated")]
    ReactionUpdated {
        conversation_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        emoji: String,
        added: bool,
        reactions: Vec<ReactionEntry>,
    },

    #[serde(rename = "read.marked")]
    ReadMarked {
        conversation_id: Uuid,
        user_id: Uuid,
        last_read_at: DateTime<Utc>,
    },
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::ReactionUpdated { .. } => "reaction.updated",
            Self::ReadMarked { .. } => "read.marked",
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        match self {
            Self::MessageNew { message } => message.conversation_id,
            Self::ReactionUpdated {
                conversation_id, ..
            } => *conversation_id,
            Self::ReadMarked {
                conversation_id, ..
            } => *conversation_id,
        }
    }
}

/// Wrapper published to Redis. `origin_node` lets the pub/sub listener drop
/// events this node already delivered through its local registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub origin_node: Uuid,
    pub conversation_id: Uuid,
    pub event: ChatEvent,
}

impl EventEnvelope {
    pub fn new(origin_node: Uuid, event: ChatEvent) -> Self {
        Self {
            origin_node,
            conversation_id: event.conversation_id(),
            event,
        }
    }
}
