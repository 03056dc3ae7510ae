//! Processors that drive duels.
//!
//! - `DuelEngine`: Receives chat-derived commands, emits ledger operations and
//!   chat output
//! - `DuelReaper`: Sends `ExpireDuels` to the engine on a schedule

pub mod duel_engine;
pub mod duel_reaper;

pub use duel_engine::{
    AbortDuels, AcceptDuel, AcceptOutcome, ChooseWeapon, DuelEngine, DuelError, ExpireDuels,
    StartDuel, WeaponOutcome, WithdrawDuels,
};
pub use duel_reaper::DuelReaper;
