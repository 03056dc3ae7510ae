pub mod chat;
pub mod duel;

pub use chat::{ChatEvent, OutgoingChat, UserLevel};
pub use duel::{DuelStatus, DuelSummary};
