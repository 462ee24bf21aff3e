pub mod chat;
pub mod directory;
pub mod reactions;
pub mod stream;
pub mod unread;

pub use chat::ChatService;
pub use directory::ConversationDirectory;
pub use reactions::ReactionAggregator;
pub use stream::MessageStream;
pub use unread::UnreadLedger;
