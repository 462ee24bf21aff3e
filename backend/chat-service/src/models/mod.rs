pub mod conversation;
pub mod message;

pub use conversation::{
    dm_key, Conversation, ConversationKind, ConversationMember, MemberProfile, MemberRole,
};
pub use message::{Message, ReactionEntry};
