use std::sync::Arc;

use crate::config::Config;
use crate::services::ChatService;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub config: Arc<Config>,
}
