//! Duel timing and wager limits.

/// Policy knobs for duels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuelConfig {
    /// How long a duel may wait for someone to `!accept` it.
    pub open_ttl: time::Duration,
    /// How long an accepted duel may wait for both weapons.
    pub awaiting_moves_ttl: time::Duration,
    /// How often the reaper scans for expired duels.
    pub sweep_interval: std::time::Duration,
    /// Largest wager accepted by `!duel`, if limited.
    pub max_wager: Option<i64>,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            open_ttl: time::Duration::minutes(2),
            awaiting_moves_ttl: time::Duration::minutes(2),
            sweep_interval: std::time::Duration::from_secs(10),
            max_wager: None,
        }
    }
}
