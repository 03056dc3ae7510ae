//! Postgres-backed points ledger.

use async_trait::async_trait;
use kanau::processor::Processor;

use super::settlement::{LedgerOp, SettlementError, SettlementGateway};
use crate::entities::user_points::{Applied, ApplyLedgerOp, GetBalance};
use crate::events::UserRef;
use crate::framework::DatabaseProcessor;

pub struct PgLedger {
    processor: DatabaseProcessor,
}

impl PgLedger {
    pub fn new(processor: DatabaseProcessor) -> Self {
        Self { processor }
    }

    async fn apply(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        let applied = self
            .processor
            .process(ApplyLedgerOp {
                event_id: op.event_id,
                username: op.user.login().to_string(),
                kind: op.kind,
                amount: op.amount,
            })
            .await?;

        match applied {
            Applied::Done => Ok(()),
            Applied::Replayed => {
                tracing::debug!(
                    event_id = %op.event_id,
                    user = %op.user,
                    kind = %op.kind,
                    "Ledger operation already applied"
                );
                Ok(())
            }
            Applied::Insufficient => Err(SettlementError::InsufficientFunds {
                user: op.user.clone(),
                amount: op.amount,
            }),
        }
    }
}

#[async_trait]
impl SettlementGateway for PgLedger {
    async fn balance(&self, user: &UserRef) -> Result<i64, SettlementError> {
        let points = self
            .processor
            .process(GetBalance {
                username: user.login().to_string(),
            })
            .await?;
        Ok(points)
    }

    async fn debit(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        op.ensure_direction(true)?;
        self.apply(op).await
    }

    async fn credit(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        op.ensure_direction(false)?;
        self.apply(op).await
    }
}
