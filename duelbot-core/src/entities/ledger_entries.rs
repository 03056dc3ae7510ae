//! Idempotency journal for point movements.
//!
//! Every debit or credit issued by the duel engine is recorded once under
//! `(event_id, username, kind)`. Replaying the same operation finds the
//! existing row and leaves balances untouched.

use uuid::Uuid;

/// Why points moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "ledger_kind")]
pub enum LedgerKind {
    /// Wager taken from a duelist when the duel is accepted.
    Escrow,
    /// Wager handed back after a draw or a cancellation.
    Refund,
    /// Pot paid to the winner.
    Payout,
}

impl LedgerKind {
    /// Whether this kind removes points from the user.
    pub fn is_debit(self) -> bool {
        matches!(self, LedgerKind::Escrow)
    }
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerKind::Escrow => write!(f, "escrow"),
            LedgerKind::Refund => write!(f, "refund"),
            LedgerKind::Payout => write!(f, "payout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub event_id: Uuid,
    pub username: String,
    pub kind: LedgerKind,
    pub amount: i64,
    pub created_at: time::PrimitiveDateTime,
}

impl LedgerEntry {
    /// Claim the journal slot for an operation inside a transaction.
    ///
    /// Returns `false` when the operation was already applied.
    pub async fn claim_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event_id: Uuid,
        username: &str,
        kind: LedgerKind,
        amount: i64,
    ) -> Result<bool, sqlx::Error> {
        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO ledger_entries (event_id, username, kind, amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id, username, kind) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(event_id)
        .bind(username)
        .bind(kind)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(inserted.is_some())
    }
}
