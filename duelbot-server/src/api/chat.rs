//! `POST /chat`

use axum::{extract::State, http::StatusCode};
use duelbot_sdk::objects::ChatEvent;

use super::extractors::SignedBody;
use crate::state::AppState;

/// Accept one chat line or whisper and run it through the command router.
///
/// The command runs in its own task so the relay is answered immediately;
/// chat output goes back through the relay separately.
pub async fn receive_chat(
    State(state): State<AppState>,
    SignedBody(event): SignedBody<ChatEvent>,
) -> StatusCode {
    let commands = state.commands.clone();
    tokio::spawn(async move {
        // The router logs every outcome.
        let _ = commands.dispatch(&event).await;
    });
    StatusCode::ACCEPTED
}
