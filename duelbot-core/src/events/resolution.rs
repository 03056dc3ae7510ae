//! Turning two submitted weapons into an outcome and a settlement plan.

use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};
use uuid::Uuid;

use super::participant::UserRef;
use super::weapon::{Clash, Weapon};
use crate::gateways::LedgerOp;

/// A duelist together with the weapon they submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hand {
    pub user: UserRef,
    pub weapon: Weapon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelOutcome {
    Draw { first: Hand, second: Hand },
    Victory { winner: Hand, loser: Hand },
}

impl DuelOutcome {
    /// Compare the initiator's hand with the target's.
    pub fn decide(initiator: Hand, target: Hand) -> Self {
        match initiator.weapon.against(target.weapon) {
            Clash::Tie => DuelOutcome::Draw {
                first: initiator,
                second: target,
            },
            Clash::Win => DuelOutcome::Victory {
                winner: initiator,
                loser: target,
            },
            Clash::Loss => DuelOutcome::Victory {
                winner: target,
                loser: initiator,
            },
        }
    }
}

/// Everything the engine needs to settle and announce a finished duel.
///
/// Produced exactly once per duel, by the `set_move` call that submitted the
/// second weapon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub duel_id: Uuid,
    pub channel: CompactString,
    pub wager: i64,
    pub outcome: DuelOutcome,
}

impl Resolution {
    /// Ledger credits that close out the escrow.
    ///
    /// A draw refunds each side its own wager; a win pays the whole pot to
    /// the winner and leaves the loser's escrow where it is.
    pub fn settlement_plan(&self) -> SmallVec<[LedgerOp; 2]> {
        match &self.outcome {
            DuelOutcome::Draw { first, second } => smallvec![
                LedgerOp::refund(self.duel_id, first.user.clone(), self.wager),
                LedgerOp::refund(self.duel_id, second.user.clone(), self.wager),
            ],
            DuelOutcome::Victory { winner, .. } => smallvec![LedgerOp::payout(
                self.duel_id,
                winner.user.clone(),
                self.pot()
            )],
        }
    }

    /// Both wagers. Registered duels never exceed `DuelEvent::WAGER_CEILING`,
    /// so this only saturates for hand-built resolutions.
    pub fn pot(&self) -> i64 {
        self.wager.saturating_mul(2)
    }

    /// Public announcement of the result.
    pub fn announcement(&self) -> String {
        match &self.outcome {
            DuelOutcome::Draw { first, second } => format!(
                "It's a draw! {} and {} both picked {}. Wagers of {} points have been returned.",
                first.user, second.user, first.weapon, self.wager
            ),
            DuelOutcome::Victory { winner, loser } => format!(
                "{}'s {} beats {}'s {}! {} wins {} points.",
                winner.user,
                winner.weapon,
                loser.user,
                loser.weapon,
                winner.user,
                self.pot()
            ),
        }
    }
}
