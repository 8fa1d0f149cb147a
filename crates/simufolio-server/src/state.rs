//! Application State

use std::sync::Arc;

use simufolio_core::{ConversationEngine, NotificationScheduler};
use simufolio_runtime::TelegramTransport;

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Conversation state machine
    pub engine: Arc<ConversationEngine>,

    /// Notification sweep
    pub scheduler: Arc<NotificationScheduler>,

    /// Telegram client, used directly for replies and callback acks
    pub transport: Arc<TelegramTransport>,

    /// Server settings (bearer secret for the sweep trigger)
    pub config: Arc<ServerConfig>,
}
