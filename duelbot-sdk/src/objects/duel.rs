//! Read-only duel listing returned by `GET /duels`.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle stage of a live duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuelStatus {
    Open,
    Escrowing,
    AwaitingMoves,
    Resolved,
    Cancelled,
}

impl std::fmt::Display for DuelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuelStatus::Open => write!(f, "open"),
            DuelStatus::Escrowing => write!(f, "escrowing"),
            DuelStatus::AwaitingMoves => write!(f, "awaiting_moves"),
            DuelStatus::Resolved => write!(f, "resolved"),
            DuelStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Snapshot of one live duel.
///
/// Chosen weapons are never exposed here, only whether each side has chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelSummary {
    pub duel_id: Uuid,
    pub channel: CompactString,
    pub initiator: CompactString,
    pub target: Option<CompactString>,
    pub opponent: Option<CompactString>,
    pub wager: i64,
    pub status: DuelStatus,
    /// Unix timestamp (seconds) of when the duel was opened.
    pub created_at: i64,
    pub initiator_ready: bool,
    pub opponent_ready: bool,
}
