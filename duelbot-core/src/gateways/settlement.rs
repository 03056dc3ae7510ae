use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::LedgerKind;
use crate::events::UserRef;

/// One point movement issued by the engine.
///
/// `(event_id, user, kind)` identifies the operation; ledgers treat a
/// repeated operation as already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOp {
    pub event_id: Uuid,
    pub user: UserRef,
    pub kind: LedgerKind,
    pub amount: i64,
}

impl LedgerOp {
    pub fn escrow(event_id: Uuid, user: UserRef, amount: i64) -> Self {
        Self {
            event_id,
            user,
            kind: LedgerKind::Escrow,
            amount,
        }
    }

    pub fn refund(event_id: Uuid, user: UserRef, amount: i64) -> Self {
        Self {
            event_id,
            user,
            kind: LedgerKind::Refund,
            amount,
        }
    }

    pub fn payout(event_id: Uuid, user: UserRef, amount: i64) -> Self {
        Self {
            event_id,
            user,
            kind: LedgerKind::Payout,
            amount,
        }
    }

    /// Fails unless this operation moves points the way the called method
    /// does: `debit` takes only escrows, `credit` only refunds and payouts.
    pub fn ensure_direction(&self, debit: bool) -> Result<(), SettlementError> {
        if self.kind.is_debit() == debit {
            return Ok(());
        }
        Err(SettlementError::WrongDirection {
            kind: self.kind,
            method: if debit { "debit" } else { "credit" },
        })
    }
}

/// Errors a ledger can report.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("{user} has insufficient points for {amount}")]
    InsufficientFunds { user: UserRef, amount: i64 },

    #[error("{user}'s balance cannot take another {amount} points")]
    Overflow { user: UserRef, amount: i64 },

    #[error("a {kind} cannot be applied as a {method}")]
    WrongDirection {
        kind: LedgerKind,
        method: &'static str,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The points ledger.
///
/// Each call is atomic for its own account; nothing spans both duelists.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    async fn balance(&self, user: &UserRef) -> Result<i64, SettlementError>;

    /// Remove points. Fails with `InsufficientFunds` rather than going negative.
    async fn debit(&self, op: &LedgerOp) -> Result<(), SettlementError>;

    /// Add points. Fails with `Overflow` rather than wrapping.
    async fn credit(&self, op: &LedgerOp) -> Result<(), SettlementError>;
}
