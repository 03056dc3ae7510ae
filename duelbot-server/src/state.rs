//! Application state shared across all request handlers.

use duelbot_core::commands::CommandRouter;
use duelbot_core::processors::DuelEngine;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Chat command router; owns the duel engine.
    pub commands: Arc<CommandRouter>,
    /// HMAC key for verifying requests from the chat relay.
    pub relay_secret: Arc<[u8]>,
}

impl AppState {
    pub fn new(commands: CommandRouter, relay_secret: impl Into<Arc<[u8]>>) -> Self {
        Self {
            commands: Arc::new(commands),
            relay_secret: relay_secret.into(),
        }
    }

    pub fn engine(&self) -> &DuelEngine {
        self.commands.engine()
    }
}
