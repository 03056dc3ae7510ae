//! The lifecycle contract every registered event implements.

use std::any::Any;
use std::sync::Arc;
use uuid::Uuid;

use super::participant::{Participants, UserRef};

/// A registered, stateful multi-party chat interaction.
///
/// Implementors keep their mutable state behind their own lock; the
/// registry only ever holds them behind an `Arc`.
pub trait Event: Send + Sync + 'static {
    fn id(&self) -> Uuid;

    /// Short kind name used in logs, e.g. `"duel"`.
    fn name(&self) -> &'static str;

    /// Whether the event is still waiting for participants to join.
    fn is_open(&self) -> bool;

    /// Upper bound on how many participants can ever join.
    fn max_participants(&self) -> usize;

    /// Snapshot of the current participants, in join order.
    fn participants(&self) -> Participants;

    /// Checks run by the registry before the event is published.
    fn validate(&self) -> Result<(), Rejection>;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Why a command was refused.
///
/// The `Display` form is chat-ready and is sent to the channel verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{user}, you have to wager at least 1 point.")]
    NonPositiveWager { user: UserRef },

    #[error("{user}, you can't duel yourself.")]
    SelfDuel { user: UserRef },

    #[error("{user}, the most you can wager is {max} points.")]
    WagerTooHigh { user: UserRef, max: i64 },

    #[error("{user}, you only have {balance} points, not enough to cover a {wager} point wager.")]
    InsufficientFunds {
        user: UserRef,
        balance: i64,
        wager: i64,
    },

    #[error("{user}, that duel is no longer open.")]
    NotOpen { user: UserRef },

    #[error("{user}, that duel was meant for {target}.")]
    NotTargeted { user: UserRef, target: UserRef },
}
