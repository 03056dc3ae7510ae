//! Test doubles for the engine's collaborators.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::events::UserRef;
use crate::gateways::{
    ChatError, ChatGateway, LedgerOp, MemoryLedger, SettlementError, SettlementGateway,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message { channel: String, text: String },
    Whisper { user: String, text: String },
}

/// Chat gateway that remembers everything it was asked to send.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingChat {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|sent| match sent {
            Sent::Message { text, .. } => Some(text),
            Sent::Whisper { .. } => None,
        })
    }

    pub fn whispers_to(&self, user: &str) -> usize {
        let login = UserRef::new(user).login().to_string();
        self.sent()
            .iter()
            .filter(|sent| matches!(sent, Sent::Whisper { user, .. } if *user == login))
            .count()
    }
}

#[async_trait]
impl ChatGateway for RecordingChat {
    async fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push(Sent::Message {
            channel: channel.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_whisper(&self, user: &UserRef, text: &str) -> Result<(), ChatError> {
        self.sent.lock().unwrap().push(Sent::Whisper {
            user: user.login().to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Memory ledger whose credits to one user always fail.
pub struct FlakyLedger {
    inner: MemoryLedger,
    broken: UserRef,
    failed_credits: AtomicUsize,
}

impl FlakyLedger {
    pub fn new(inner: MemoryLedger, broken: &str) -> Self {
        Self {
            inner,
            broken: UserRef::new(broken),
            failed_credits: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &MemoryLedger {
        &self.inner
    }

    pub fn failed_credits(&self) -> usize {
        self.failed_credits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettlementGateway for FlakyLedger {
    async fn balance(&self, user: &UserRef) -> Result<i64, SettlementError> {
        self.inner.balance(user).await
    }

    async fn debit(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        self.inner.debit(op).await
    }

    async fn credit(&self, op: &LedgerOp) -> Result<(), SettlementError> {
        if op.user == self.broken {
            self.failed_credits.fetch_add(1, Ordering::SeqCst);
            return Err(SettlementError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.credit(op).await
    }
}
