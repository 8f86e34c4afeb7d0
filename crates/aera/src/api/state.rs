//! Application state shared across handlers.

use std::sync::Arc;

use crate::ai::TextGenerator;
use crate::auth::AuthState;
use crate::chat::ChatOrchestrator;
use crate::conversation::ConversationRepository;
use crate::db::Database;
use crate::user::{UserRepository, UserService};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub conversations: ConversationRepository,
    pub chat: ChatOrchestrator,
    pub auth: AuthState,
}

impl AppState {
    pub fn new(db: &Database, auth: AuthState, backend: Arc<dyn TextGenerator>) -> Self {
        let users = UserService::new(UserRepository::new(db.pool().clone()));
        let conversations = ConversationRepository::new(db.pool().clone());
        let chat = ChatOrchestrator::new(conversations.clone(), users.clone(), backend);

        Self {
            users,
            conversations,
            chat,
            auth,
        }
    }
}
