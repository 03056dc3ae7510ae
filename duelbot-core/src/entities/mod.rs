pub mod ledger_entries;
pub mod user_points;

pub use ledger_entries::LedgerKind;
