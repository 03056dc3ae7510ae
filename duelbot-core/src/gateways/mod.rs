//! Collaborators the duel engine talks to: the points ledger and chat.
//!
//! The engine only sees the [`SettlementGateway`] and [`ChatGateway`]
//! traits. Production wiring uses [`PgLedger`] and [`RelayChatGateway`];
//! [`MemoryLedger`] backs local runs and tests.

pub mod chat;
pub mod memory_ledger;
pub mod pg_ledger;
pub mod relay;
pub mod settlement;

pub use chat::{ChatError, ChatGateway};
pub use memory_ledger::MemoryLedger;
pub use pg_ledger::PgLedger;
pub use relay::RelayChatGateway;
pub use settlement::{LedgerOp, SettlementError, SettlementGateway};
