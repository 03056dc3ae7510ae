use crate::entities::ledger_entries::{LedgerEntry, LedgerKind};
use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;
use uuid::Uuid;

/// Read a user's current balance. Unknown users have zero points.
#[derive(Debug, Clone)]
pub struct GetBalance {
    pub username: String,
}

impl Processor<GetBalance> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetBalance")]
    async fn process(&self, query: GetBalance) -> Result<i64, sqlx::Error> {
        let points: Option<i64> =
            sqlx::query_scalar(r#"SELECT points FROM user_points WHERE username = $1"#)
                .bind(&query.username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(points.unwrap_or(0))
    }
}

/// Outcome of a journaled point movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Balance changed.
    Done,
    /// The same operation was already journaled; nothing changed.
    Replayed,
    /// Debit refused because the balance would go negative.
    Insufficient,
}

/// Move points for one duel operation, exactly once.
#[derive(Debug, Clone)]
pub struct ApplyLedgerOp {
    pub event_id: Uuid,
    pub username: String,
    pub kind: LedgerKind,
    pub amount: i64,
}

impl Processor<ApplyLedgerOp> for DatabaseProcessor {
    type Output = Applied;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ApplyLedgerOp")]
    async fn process(&self, op: ApplyLedgerOp) -> Result<Applied, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let claimed =
            LedgerEntry::claim_tx(&mut tx, op.event_id, &op.username, op.kind, op.amount).await?;
        if !claimed {
            tx.rollback().await?;
            return Ok(Applied::Replayed);
        }

        if op.kind.is_debit() {
            let result = sqlx::query(
                r#"
                UPDATE user_points
                SET points = points - $1, updated_at = now()
                WHERE username = $2 AND points >= $1
                "#,
            )
            .bind(op.amount)
            .bind(&op.username)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                // Dropping the claim lets a later retry try again.
                tx.rollback().await?;
                return Ok(Applied::Insufficient);
            }
        } else {
            sqlx::query(
                r#"
                INSERT INTO user_points (username, points)
                VALUES ($1, $2)
                ON CONFLICT (username)
                DO UPDATE SET points = user_points.points + EXCLUDED.points, updated_at = now()
                "#,
            )
            .bind(&op.username)
            .bind(op.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Applied::Done)
    }
}
