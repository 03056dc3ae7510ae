//! In-process points ledger.
//!
//! Used by `--memory-ledger` runs and by tests. Balances live in a map keyed
//! by login; the journal gives the same replay semantics as the Postgres
//! ledger.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use super::settlement::{LedgerOp, SettlementError, SettlementGateway};
use crate::entities::LedgerKind;
use crate::events::UserRef;

#[derive(Default)]
struct Books {
    balances: HashMap<String, i64>,
    journal: HashSet<(Uuid, String, LedgerKind)>,
}

pub struct MemoryLedger {
    starting_balance: i64,
    books: Mutex<Books>,
}

impl MemoryLedger {
    /// Create a ledger where users not seen before start with `starting_balance`.
    pub fn new(starting_balance: i64) -> Self {
        Self {
            starting_balance,
            books: Mutex::new(Books::default()),
        }
    }

    /// Seed explicit balances.
    pub fn with_balances<'a>(self, balances: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        {
            let mut books = self.books();
            for (user, points) in balances {
                books
                    .balances
                    .insert(UserRef::new(user).login().to_string(), points);
            }
        }
        self
    }

    /// Current balance without going through the async trait.
    pub fn balance_of(&self, user: &str) -> i64 {
        let login = UserRef::new(user).login().to_string();
        self.books()
            .balances
            .get(&login)
            .copied()
            .unwrap_or(self.starting_balance)
    }

    fn books(&self) -> std::sync::MutexGuard<'_, Books> {
        self.books.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn apply(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        let login = op.user.login().to_string();
        let mut books = self.books();

        let key = (op.event_id, login.clone(), op.kind);
        if books.journal.contains(&key) {
            tracing::debug!(
                event_id = %op.event_id,
                user = %op.user,
                kind = %op.kind,
                "Ledger operation already applied"
            );
            return Ok(());
        }

        let starting = self.starting_balance;
        let balance = books.balances.entry(login).or_insert(starting);
        if op.kind.is_debit() {
            if *balance < op.amount {
                return Err(SettlementError::InsufficientFunds {
                    user: op.user.clone(),
                    amount: op.amount,
                });
            }
            *balance -= op.amount;
        } else {
            *balance = balance
                .checked_add(op.amount)
                .ok_or_else(|| SettlementError::Overflow {
                    user: op.user.clone(),
                    amount: op.amount,
                })?;
        }

        books.journal.insert(key);
        Ok(())
    }
}

#[async_trait]
impl SettlementGateway for MemoryLedger {
    async fn balance(&self, user: &UserRef) -> Result<i64, SettlementError> {
        Ok(self.balance_of(user.login()))
    }

    async fn debit(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        op.ensure_direction(true)?;
        self.apply(op)
    }

    async fn credit(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        op.ensure_direction(false)?;
        self.apply(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_debit_refuses_overdraft() {
        let ledger = MemoryLedger::new(0).with_balances([("alice", 50)]);
        let op = LedgerOp::escrow(Uuid::now_v7(), "alice".into(), 80);

        let err = ledger.debit(&op).await.unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientFunds { amount: 80, .. }));
        assert_eq!(ledger.balance_of("alice"), 50);

        // The refused debit is not journaled, so it may be retried.
        let smaller = LedgerOp::escrow(op.event_id, "alice".into(), 50);
        ledger.debit(&smaller).await.unwrap();
        assert_eq!(ledger.balance_of("Alice"), 0);
    }

    #[tokio::test]
    async fn test_replayed_operation_is_noop() {
        let ledger = MemoryLedger::new(100);
        let event_id = Uuid::now_v7();
        let payout = LedgerOp::payout(event_id, "bob".into(), 40);

        ledger.credit(&payout).await.unwrap();
        ledger.credit(&payout).await.unwrap();
        assert_eq!(ledger.balance_of("bob"), 140);

        let refund = LedgerOp::refund(event_id, "bob".into(), 40);
        ledger.credit(&refund).await.unwrap();
        assert_eq!(ledger.balance_of("bob"), 180);
    }

    #[tokio::test]
    async fn test_method_must_match_kind() {
        let ledger = MemoryLedger::new(100);
        let event_id = Uuid::now_v7();

        let err = ledger
            .credit(&LedgerOp::escrow(event_id, "alice".into(), 30))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SettlementError::WrongDirection { kind: LedgerKind::Escrow, method: "credit" }
        ));
        let err = ledger
            .debit(&LedgerOp::payout(event_id, "alice".into(), 30))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::WrongDirection { method: "debit", .. }));
        assert_eq!(ledger.balance_of("alice"), 100);

        // Neither refusal was journaled.
        ledger
            .debit(&LedgerOp::escrow(event_id, "alice".into(), 30))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of("alice"), 70);
    }

    #[tokio::test]
    async fn test_credit_refuses_overflow() {
        let ledger = MemoryLedger::new(0).with_balances([("alice", i64::MAX - 10)]);
        let event_id = Uuid::now_v7();

        let err = ledger
            .credit(&LedgerOp::payout(event_id, "alice".into(), 11))
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::Overflow { amount: 11, .. }));
        assert_eq!(ledger.balance_of("alice"), i64::MAX - 10);

        ledger
            .credit(&LedgerOp::payout(event_id, "alice".into(), 10))
            .await
            .unwrap();
        assert_eq!(ledger.balance_of("alice"), i64::MAX);
    }
}
