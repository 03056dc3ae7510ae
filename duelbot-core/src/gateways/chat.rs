use async_trait::async_trait;
use thiserror::Error;

use crate::events::UserRef;

/// Errors that can occur while delivering chat output.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Relay answered with a non-success status
    #[error("chat delivery failed with status {status}: {body}")]
    DeliveryFailed { status: u16, body: String },

    /// Payload serialization error
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Outbound chat.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Post a public message in `channel`.
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError>;

    /// Whisper privately to `user`.
    async fn send_whisper(&self, user: &UserRef, text: &str) -> Result<(), ChatError>;
}
