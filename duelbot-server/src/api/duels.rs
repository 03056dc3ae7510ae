//! `GET /duels`

use axum::{Json, extract::State};
use duelbot_core::events::DuelEvent;
use duelbot_sdk::objects::DuelSummary;

use crate::state::AppState;

/// List every live duel, oldest first.
pub async fn list_duels(State(state): State<AppState>) -> Json<Vec<DuelSummary>> {
    let duels = state.engine().registry().get_events::<DuelEvent>().await;
    Json(duels.iter().map(|duel| duel.summary()).collect())
}
