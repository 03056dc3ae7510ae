//! Runtime configuration shared between the engine and the server.
//!
//! The server crate parses the TOML file and builds these types; the engine
//! and the reaper only ever read them.

mod config_store;
mod duel;

pub use config_store::{ConfigStore, ConfigWatcher};
pub use duel::DuelConfig;
