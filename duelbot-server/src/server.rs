//! Axum server setup and router configuration.

use crate::api;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Inbound chat from the relay
        .route("/chat", post(api::chat::receive_chat))
        // Read-only listing of live duels
        .route("/duels", get(api::duels::list_duels))
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
pub async fn run_server(router: Router, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use duelbot_core::commands::CommandRouter;
    use duelbot_core::config::{ConfigStore, DuelConfig};
    use duelbot_core::events::{EventRegistry, UserRef};
    use duelbot_core::gateways::{ChatError, ChatGateway, MemoryLedger};
    use duelbot_core::processors::DuelEngine;
    use duelbot_sdk::objects::{ChatEvent, DuelStatus, DuelSummary, UserLevel};
    use duelbot_sdk::signature::{SIGNATURE_HEADER, SignedObject};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const SECRET: &[u8] = b"relay-secret";

    struct SilentChat;

    #[async_trait]
    impl ChatGateway for SilentChat {
        async fn send_message(&self, _: &str, _: &str) -> Result<(), ChatError> {
            Ok(())
        }

        async fn send_whisper(&self, _: &UserRef, _: &str) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn app() -> (Router, AppState) {
        let engine = Arc::new(DuelEngine::new(
            EventRegistry::new(),
            Arc::new(MemoryLedger::new(100)),
            Arc::new(SilentChat),
            ConfigStore::new(DuelConfig::default()),
        ));
        let state = AppState::new(CommandRouter::with_duel_commands(engine), SECRET);
        (build_router(state.clone()), state)
    }

    fn chat_request(event: ChatEvent, key: &[u8]) -> Request<Body> {
        let signed = SignedObject::new(event, key).unwrap();
        Request::post("/chat")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signed.to_header())
            .body(Body::from(signed.json))
            .unwrap()
    }

    fn duel_line() -> ChatEvent {
        ChatEvent {
            channel: Some("streamer".into()),
            user: "alice".into(),
            level: UserLevel::Viewer,
            message: "!duel @bob 40".to_string(),
        }
    }

    async fn list(router: Router) -> Vec<DuelSummary> {
        let response = router
            .oneshot(Request::get("/duels").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_requires_valid_signature() {
        let (router, state) = app();

        let unsigned = Request::post("/chat")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&duel_line()).unwrap()))
            .unwrap();
        let response = router.clone().oneshot(unsigned).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(chat_request(duel_line(), b"wrong-secret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(state.engine().registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_signed_chat_opens_duel() {
        let (router, state) = app();

        let response = router
            .clone()
            .oneshot(chat_request(duel_line(), SECRET))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        tokio::time::timeout(Duration::from_secs(5), async {
            while state.engine().registry().is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let duels = list(router).await;
        assert_eq!(duels.len(), 1);
        assert_eq!(duels[0].initiator, "alice");
        assert_eq!(duels[0].target.as_deref(), Some("bob"));
        assert_eq!(duels[0].wager, 40);
        assert_eq!(duels[0].status, DuelStatus::Open);
        assert!(!duels[0].initiator_ready && !duels[0].opponent_ready);
    }
}
