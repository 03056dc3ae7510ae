//! Chat gateway that hands output to the chat relay over HTTP.
//!
//! Every message or whisper is POSTed to the relay's outbound URL as a signed
//! [`OutgoingChat`] body. Delivery is retried a few times with exponential
//! backoff; after that the failure is returned to the caller, which logs it.

use async_trait::async_trait;
use duelbot_sdk::objects::OutgoingChat;
use duelbot_sdk::signature::{SIGNATURE_HEADER, SignedObject};
use tracing::{debug, warn};

use super::chat::{ChatError, ChatGateway};
use crate::events::UserRef;

/// Delivery attempts per outgoing line.
const MAX_ATTEMPTS: u32 = 3;

pub struct RelayChatGateway {
    http_client: reqwest::Client,
    outbound_url: url::Url,
    secret: Box<[u8]>,
}

impl RelayChatGateway {
    /// Create a new RelayChatGateway.
    ///
    /// # Arguments
    ///
    /// * `outbound_url` - Relay endpoint that accepts `OutgoingChat` bodies
    /// * `secret` - HMAC key shared with the relay
    pub fn new(outbound_url: url::Url, secret: impl Into<Box<[u8]>>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            outbound_url,
            secret: secret.into(),
        }
    }

    async fn deliver(&self, chat: OutgoingChat) -> Result<(), ChatError> {
        let mut attempt = 0;
        loop {
            match self.post_once(chat.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                    let delay = calculate_retry_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        error = %e,
                        retry_in = ?delay,
                        "Chat delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, chat: OutgoingChat) -> Result<(), ChatError> {
        // Re-signed per attempt so the timestamp stays fresh.
        let signed = SignedObject::new(chat, &self.secret)?;

        let response = self
            .http_client
            .post(self.outbound_url.clone())
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(signed.json)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "Chat delivered to relay");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ChatError::DeliveryFailed {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl ChatGateway for RelayChatGateway {
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        self.deliver(OutgoingChat::Message {
            channel: channel.into(),
            text: text.to_string(),
        })
        .await
    }

    async fn send_whisper(&self, user: &UserRef, text: &str) -> Result<(), ChatError> {
        self.deliver(OutgoingChat::Whisper {
            user: user.display_name().into(),
            text: text.to_string(),
        })
        .await
    }
}

/// Backoff before retry number `attempt + 1`: 2^attempt seconds.
pub fn calculate_retry_delay(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_secs(2u64.pow(attempt.min(MAX_ATTEMPTS)))
}
