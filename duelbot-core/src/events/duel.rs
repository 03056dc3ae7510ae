//! Wagered rock-paper-scissors between two chatters.
//!
//! # Lifecycle
//!
//! ```text
//! Open ──accept──> Escrowing ──confirm_escrow──> AwaitingMoves ──2nd set_move──> Resolved
//!  │                   │                              │
//!  └──cancel──┐        └──abort_escrow──┐             └──cancel──┐
//!             v                         v                        v
//!         Cancelled                 Cancelled                Cancelled
//! ```
//!
//! Every transition happens under the duel's own mutex and returns an owned
//! ticket describing what the caller must do next (debit, refund, announce).
//! The lock is never held across I/O; callers act on the ticket after the
//! transition has committed.

use compact_str::CompactString;
use duelbot_sdk::objects::{DuelStatus, DuelSummary};
use smallvec::SmallVec;
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard};
use time::OffsetDateTime;
use uuid::Uuid;

use super::event::{Event, Rejection};
use super::participant::{Participant, Participants, Role, UserRef};
use super::resolution::{DuelOutcome, Hand, Resolution};
use super::weapon::Weapon;
use crate::config::DuelConfig;

/// Where a duel is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuelPhase {
    /// Waiting for someone to accept.
    Open,
    /// Accepted; wagers are being debited.
    Escrowing,
    /// Both wagers held; waiting for both weapons.
    AwaitingMoves,
    Resolved,
    Cancelled,
}

impl From<DuelPhase> for DuelStatus {
    fn from(value: DuelPhase) -> Self {
        match value {
            DuelPhase::Open => DuelStatus::Open,
            DuelPhase::Escrowing => DuelStatus::Escrowing,
            DuelPhase::AwaitingMoves => DuelStatus::AwaitingMoves,
            DuelPhase::Resolved => DuelStatus::Resolved,
            DuelPhase::Cancelled => DuelStatus::Cancelled,
        }
    }
}

/// Why a weapon could not be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("duel is not waiting for weapons")]
    NotAwaitingMoves,
    #[error("user is not part of this duel")]
    NotParticipant,
    #[error("weapon already chosen")]
    AlreadyChosen,
}

/// Result of a successful `set_move`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Weapon stored; still waiting for the other duelist.
    Recorded { waiting_on: UserRef },
    /// This was the second weapon. The duel is now `Resolved`.
    Resolved(Resolution),
}

/// Handed to the winner of an `accept` race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowTicket {
    pub duel_id: Uuid,
    pub channel: CompactString,
    pub initiator: UserRef,
    pub opponent: UserRef,
    pub wager: i64,
}

/// Why a duel was cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelReason {
    /// Nobody accepted in time.
    Unanswered,
    /// Accepted but at least one weapon never arrived.
    Stalled,
    /// The initiator withdrew it.
    Withdrawn,
    /// A moderator stopped it.
    Aborted { by: UserRef },
    /// Escrow could not be collected from `user`.
    EscrowFailed { user: UserRef },
}

/// Handed to whoever cancelled a duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub duel_id: Uuid,
    pub channel: CompactString,
    pub initiator: UserRef,
    pub wager: i64,
    /// Users whose escrowed wager must be handed back.
    pub refunds: SmallVec<[UserRef; 2]>,
    pub reason: CancelReason,
}

impl Cancellation {
    /// Public announcement of the cancellation.
    pub fn announcement(&self) -> String {
        match &self.reason {
            CancelReason::Unanswered => format!(
                "Nobody accepted {}'s duel for {} points in time.",
                self.initiator, self.wager
            ),
            CancelReason::Stalled => format!(
                "{}'s duel timed out waiting for weapons. Wagers of {} points have been returned.",
                self.initiator, self.wager
            ),
            CancelReason::Withdrawn => {
                format!("{} withdrew their duel for {} points.", self.initiator, self.wager)
            }
            CancelReason::Aborted { by } => format!(
                "{} cancelled {}'s duel. Any wagers taken have been returned.",
                by, self.initiator
            ),
            CancelReason::EscrowFailed { user } => format!(
                "{}'s duel was called off: {} could not cover the {} point wager.",
                self.initiator, user, self.wager
            ),
        }
    }
}

struct DuelState {
    phase: DuelPhase,
    participants: Participants,
    accepted_at: Option<OffsetDateTime>,
}

/// A wagered duel. `N = 2`.
pub struct DuelEvent {
    id: Uuid,
    channel: CompactString,
    initiator: UserRef,
    target: Option<UserRef>,
    wager: i64,
    initiator_balance: i64,
    max_wager: Option<i64>,
    created_at: OffsetDateTime,
    state: Mutex<DuelState>,
}

impl DuelEvent {
    pub const MAX_PARTICIPANTS: usize = 2;

    /// Largest wager whose pot still fits in an `i64`.
    pub const WAGER_CEILING: i64 = i64::MAX / 2;

    /// Create an unregistered duel.
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel the duel was opened in; results are announced there
    /// * `initiator` - The user issuing `!duel`
    /// * `target` - Optional user the duel is directed at
    /// * `wager` - Points each side stakes; validated on registration
    /// * `initiator_balance` - The initiator's balance when the command ran
    pub fn new(
        channel: impl Into<CompactString>,
        initiator: UserRef,
        target: Option<UserRef>,
        wager: i64,
        initiator_balance: i64,
    ) -> Self {
        let mut participants = Participants::new();
        participants.push(Participant::new(initiator.clone(), Role::Initiator));
        Self {
            id: Uuid::now_v7(),
            channel: channel.into(),
            initiator,
            target,
            wager,
            initiator_balance,
            max_wager: None,
            created_at: OffsetDateTime::now_utc(),
            state: Mutex::new(DuelState {
                phase: DuelPhase::Open,
                participants,
                accepted_at: None,
            }),
        }
    }

    pub fn with_max_wager(mut self, max_wager: Option<i64>) -> Self {
        self.max_wager = max_wager;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn initiator(&self) -> &UserRef {
        &self.initiator
    }

    pub fn target(&self) -> Option<&UserRef> {
        self.target.as_ref()
    }

    pub fn wager(&self) -> i64 {
        self.wager
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn phase(&self) -> DuelPhase {
        self.state().phase
    }

    fn state(&self) -> MutexGuard<'_, DuelState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether this duel names `user` as its target.
    pub fn is_directed_at(&self, user: &UserRef) -> bool {
        self.target.as_ref() == Some(user)
    }

    /// Whether `user` is one of the (up to two) duelists, or the target of
    /// a duel nobody has accepted yet.
    pub fn involves(&self, user: &UserRef) -> bool {
        &self.initiator == user
            || self.is_directed_at(user)
            || self.state().participants.iter().any(|p| &p.user == user)
    }

    /// Pure check of whether `user`, holding `balance` points, may accept.
    pub fn can_accept(&self, user: &UserRef, balance: i64) -> Result<(), Rejection> {
        if self.phase() != DuelPhase::Open {
            return Err(Rejection::NotOpen { user: user.clone() });
        }
        if user == &self.initiator {
            return Err(Rejection::SelfDuel { user: user.clone() });
        }
        if let Some(target) = self.target.as_ref().filter(|t| *t != user) {
            return Err(Rejection::NotTargeted {
                user: user.clone(),
                target: target.clone(),
            });
        }
        if balance < self.wager {
            return Err(Rejection::InsufficientFunds {
                user: user.clone(),
                balance,
                wager: self.wager,
            });
        }
        Ok(())
    }

    /// Bind `user` as the second duelist.
    ///
    /// Exactly one concurrent caller gets the ticket; everyone else sees the
    /// duel already closed and gets `None`.
    pub fn accept(&self, user: UserRef) -> Option<EscrowTicket> {
        let mut state = self.state();
        if state.phase != DuelPhase::Open
            || user == self.initiator
            || self.target.as_ref().is_some_and(|t| t != &user)
        {
            return None;
        }

        state
            .participants
            .push(Participant::new(user.clone(), Role::Target));
        state.phase = DuelPhase::Escrowing;
        state.accepted_at = Some(OffsetDateTime::now_utc());

        Some(EscrowTicket {
            duel_id: self.id,
            channel: self.channel.clone(),
            initiator: self.initiator.clone(),
            opponent: user,
            wager: self.wager,
        })
    }

    /// Both wagers are held; start waiting for weapons.
    pub fn confirm_escrow(&self) -> bool {
        let mut state = self.state();
        if state.phase != DuelPhase::Escrowing {
            return false;
        }
        state.phase = DuelPhase::AwaitingMoves;
        // The weapon timer starts once both wagers are held.
        state.accepted_at = Some(OffsetDateTime::now_utc());
        true
    }

    /// Escrow could not be collected from `user`; the duel is dead.
    ///
    /// Refunds for whichever debits did succeed are the caller's job, since
    /// only the caller knows which ones those were.
    pub fn abort_escrow(&self, user: UserRef) -> Option<Cancellation> {
        let mut state = self.state();
        if state.phase != DuelPhase::Escrowing {
            return None;
        }
        state.phase = DuelPhase::Cancelled;
        Some(self.cancellation(SmallVec::new(), CancelReason::EscrowFailed { user }))
    }

    /// Look up a duelist. Only accepted, unfinished duels have two
    /// addressable participants.
    pub fn get_participant(&self, user: &UserRef) -> Option<Participant> {
        let state = self.state();
        if !matches!(
            state.phase,
            DuelPhase::Escrowing | DuelPhase::AwaitingMoves
        ) {
            return None;
        }
        state.participants.iter().find(|p| &p.user == user).cloned()
    }

    /// Record `user`'s weapon.
    ///
    /// The call that fills in the second weapon flips the duel to `Resolved`
    /// inside the same critical section and receives the [`Resolution`], so
    /// resolution happens exactly once however the two submissions race.
    pub fn set_move(&self, user: &UserRef, weapon: Weapon) -> Result<MoveOutcome, MoveError> {
        let mut state = self.state();
        if state.phase != DuelPhase::AwaitingMoves {
            return Err(MoveError::NotAwaitingMoves);
        }

        let participant = state
            .participants
            .iter_mut()
            .find(|p| &p.user == user)
            .ok_or(MoveError::NotParticipant)?;
        if participant.has_moved() {
            return Err(MoveError::AlreadyChosen);
        }
        participant.weapon = Some(weapon);

        let hands: SmallVec<[Hand; 2]> = state
            .participants
            .iter()
            .filter_map(|p| {
                p.weapon.map(|weapon| Hand {
                    user: p.user.clone(),
                    weapon,
                })
            })
            .collect();

        if hands.len() < Self::MAX_PARTICIPANTS {
            let waiting_on = state
                .participants
                .iter()
                .find(|p| !p.has_moved())
                .map(|p| p.user.clone())
                .ok_or(MoveError::NotParticipant)?;
            return Ok(MoveOutcome::Recorded { waiting_on });
        }

        state.phase = DuelPhase::Resolved;
        let mut hands = hands.into_iter();
        let (Some(initiator), Some(target)) = (hands.next(), hands.next()) else {
            return Err(MoveError::NotParticipant);
        };

        Ok(MoveOutcome::Resolved(Resolution {
            duel_id: self.id,
            channel: self.channel.clone(),
            wager: self.wager,
            outcome: DuelOutcome::decide(initiator, target),
        }))
    }

    /// Cancel an `Open` or `AwaitingMoves` duel.
    ///
    /// Returns `None` if the duel is escrowing or already finished.
    pub fn cancel(&self, reason: CancelReason) -> Option<Cancellation> {
        let mut state = self.state();
        self.cancel_locked(&mut state, reason)
    }

    /// Cancel the duel if it has outlived its phase's TTL at `now`.
    ///
    /// The age check and the transition share one critical section, so a
    /// weapon arriving concurrently either resolves the duel first or finds
    /// it cancelled.
    pub fn cancel_if_expired(
        &self,
        now: OffsetDateTime,
        config: &DuelConfig,
    ) -> Option<Cancellation> {
        let mut state = self.state();
        let reason = match state.phase {
            DuelPhase::Open if now - self.created_at >= config.open_ttl => {
                CancelReason::Unanswered
            }
            DuelPhase::AwaitingMoves
                if state
                    .accepted_at
                    .is_some_and(|at| now - at >= config.awaiting_moves_ttl) =>
            {
                CancelReason::Stalled
            }
            _ => return None,
        };
        self.cancel_locked(&mut state, reason)
    }

    fn cancel_locked(
        &self,
        state: &mut DuelState,
        reason: CancelReason,
    ) -> Option<Cancellation> {
        let refunds = match state.phase {
            DuelPhase::Open => SmallVec::new(),
            DuelPhase::AwaitingMoves => state.participants.iter().map(|p| p.user.clone()).collect(),
            DuelPhase::Escrowing | DuelPhase::Resolved | DuelPhase::Cancelled => return None,
        };
        state.phase = DuelPhase::Cancelled;
        Some(self.cancellation(refunds, reason))
    }

    fn cancellation(&self, refunds: SmallVec<[UserRef; 2]>, reason: CancelReason) -> Cancellation {
        Cancellation {
            duel_id: self.id,
            channel: self.channel.clone(),
            initiator: self.initiator.clone(),
            wager: self.wager,
            refunds,
            reason,
        }
    }

    /// Read-only view for listings. Weapons are reduced to "has chosen".
    pub fn summary(&self) -> DuelSummary {
        let state = self.state();
        let opponent = state.participants.iter().find(|p| p.role == Role::Target);
        let initiator_ready = state
            .participants
            .iter()
            .any(|p| p.role == Role::Initiator && p.has_moved());
        DuelSummary {
            duel_id: self.id,
            channel: self.channel.clone(),
            initiator: self.initiator.display_name().into(),
            target: self.target.as_ref().map(|t| t.display_name().into()),
            opponent: opponent.map(|p| p.user.display_name().into()),
            wager: self.wager,
            status: state.phase.into(),
            created_at: self.created_at.unix_timestamp(),
            initiator_ready,
            opponent_ready: opponent.is_some_and(Participant::has_moved),
        }
    }
}

impl std::fmt::Debug for DuelEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuelEvent")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("initiator", &self.initiator)
            .field("target", &self.target)
            .field("wager", &self.wager)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl Event for DuelEvent {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &'static str {
        "duel"
    }

    fn is_open(&self) -> bool {
        self.phase() == DuelPhase::Open
    }

    fn max_participants(&self) -> usize {
        Self::MAX_PARTICIPANTS
    }

    fn participants(&self) -> Participants {
        self.state().participants.clone()
    }

    fn validate(&self) -> Result<(), Rejection> {
        let user = self.initiator.clone();
        if self.wager <= 0 {
            return Err(Rejection::NonPositiveWager { user });
        }
        if self.target.as_ref() == Some(&self.initiator) {
            return Err(Rejection::SelfDuel { user });
        }
        let max = self
            .max_wager
            .map_or(Self::WAGER_CEILING, |max| max.min(Self::WAGER_CEILING));
        if self.wager > max {
            return Err(Rejection::WagerTooHigh { user, max });
        }
        if self.wager > self.initiator_balance {
            return Err(Rejection::InsufficientFunds {
                user,
                balance: self.initiator_balance,
                wager: self.wager,
            });
        }
        Ok(())
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_duel(wager: i64) -> DuelEvent {
        DuelEvent::new("streamer", "alice".into(), None, wager, 500)
    }

    fn awaiting_duel(wager: i64) -> DuelEvent {
        let duel = open_duel(wager);
        duel.accept("bob".into()).unwrap();
        assert!(duel.confirm_escrow());
        duel
    }

    #[test]
    fn test_validate_rejects_non_positive_wager() {
        for wager in [0, -1, -500] {
            assert!(matches!(
                open_duel(wager).validate(),
                Err(Rejection::NonPositiveWager { .. })
            ));
        }
        assert!(open_duel(1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_self_duel_case_insensitive() {
        let duel = DuelEvent::new("streamer", "Alice".into(), Some("aLIce".into()), 10, 500);
        assert!(matches!(duel.validate(), Err(Rejection::SelfDuel { .. })));
    }

    #[test]
    fn test_validate_checks_balance_and_cap() {
        let duel = DuelEvent::new("streamer", "alice".into(), None, 600, 500);
        assert!(matches!(
            duel.validate(),
            Err(Rejection::InsufficientFunds { balance: 500, wager: 600, .. })
        ));

        let capped = open_duel(300).with_max_wager(Some(200));
        let err = capped.validate().unwrap_err();
        assert_eq!(err.to_string(), "alice, the most you can wager is 200 points.");
    }

    #[test]
    fn test_validate_caps_wager_at_half_of_i64() {
        let ceiling = DuelEvent::WAGER_CEILING;
        let rich = DuelEvent::new("streamer", "alice".into(), None, ceiling + 1, i64::MAX);
        assert!(matches!(
            rich.validate(),
            Err(Rejection::WagerTooHigh { max: DuelEvent::WAGER_CEILING, .. })
        ));

        // A configured cap above the ceiling does not lift it.
        let loose_cap = DuelEvent::new("streamer", "alice".into(), None, i64::MAX, i64::MAX)
            .with_max_wager(Some(i64::MAX));
        assert!(matches!(loose_cap.validate(), Err(Rejection::WagerTooHigh { .. })));

        let at_ceiling = DuelEvent::new("streamer", "alice".into(), None, ceiling, i64::MAX);
        assert!(at_ceiling.validate().is_ok());
    }

    #[test]
    fn test_involves_target_of_open_duel() {
        let directed = DuelEvent::new("streamer", "alice".into(), Some("bob".into()), 10, 500);
        assert!(directed.involves(&"Bob".into()));
        assert!(directed.involves(&"alice".into()));
        assert!(!directed.involves(&"carol".into()));

        let undirected = open_duel(10);
        assert!(!undirected.involves(&"bob".into()));
        undirected.accept("bob".into()).unwrap();
        assert!(undirected.involves(&"bob".into()));
    }

    #[test]
    fn test_can_accept() {
        let duel = open_duel(100);
        assert!(matches!(
            duel.can_accept(&"bob".into(), 99),
            Err(Rejection::InsufficientFunds { .. })
        ));
        assert!(matches!(
            duel.can_accept(&"ALICE".into(), 1000),
            Err(Rejection::SelfDuel { .. })
        ));
        assert!(duel.can_accept(&"bob".into(), 100).is_ok());

        let directed = DuelEvent::new("streamer", "alice".into(), Some("bob".into()), 10, 500);
        assert!(matches!(
            directed.can_accept(&"carol".into(), 1000),
            Err(Rejection::NotTargeted { .. })
        ));
        assert!(directed.can_accept(&"Bob".into(), 1000).is_ok());
    }

    #[test]
    fn test_accept_closes_once() {
        let duel = open_duel(100);
        assert!(duel.is_open());
        assert!(duel.get_participant(&"alice".into()).is_none());

        let ticket = duel.accept("bob".into()).unwrap();
        assert_eq!(ticket.opponent, UserRef::new("bob"));
        assert_eq!(ticket.wager, 100);
        assert!(!duel.is_open());
        assert_eq!(duel.participants().len(), 2);

        assert!(duel.accept("carol".into()).is_none());
        assert!(matches!(
            duel.can_accept(&"carol".into(), 1000),
            Err(Rejection::NotOpen { .. })
        ));
        assert_eq!(duel.participants().len(), 2);
        assert_eq!(
            duel.get_participant(&"BOB".into()).map(|p| p.role),
            Some(Role::Target)
        );
    }

    #[test]
    fn test_moves_rejected_until_escrow_confirmed() {
        let duel = open_duel(100);
        assert_eq!(
            duel.set_move(&"alice".into(), Weapon::Rock),
            Err(MoveError::NotAwaitingMoves)
        );
        duel.accept("bob".into()).unwrap();
        assert_eq!(
            duel.set_move(&"alice".into(), Weapon::Rock),
            Err(MoveError::NotAwaitingMoves)
        );
        assert!(duel.confirm_escrow());
        assert!(duel.set_move(&"alice".into(), Weapon::Rock).is_ok());
    }

    #[test]
    fn test_second_move_resolves() {
        let duel = awaiting_duel(100);

        let first = duel.set_move(&"bob".into(), Weapon::Scissors).unwrap();
        assert_eq!(
            first,
            MoveOutcome::Recorded {
                waiting_on: "alice".into()
            }
        );
        assert_eq!(
            duel.set_move(&"bob".into(), Weapon::Paper),
            Err(MoveError::AlreadyChosen)
        );
        assert_eq!(
            duel.set_move(&"carol".into(), Weapon::Paper),
            Err(MoveError::NotParticipant)
        );

        let MoveOutcome::Resolved(resolution) =
            duel.set_move(&"alice".into(), Weapon::Rock).unwrap()
        else {
            panic!("second move should resolve");
        };
        assert_eq!(duel.phase(), DuelPhase::Resolved);
        assert!(matches!(
            resolution.outcome,
            DuelOutcome::Victory { ref winner, .. } if winner.user == UserRef::new("alice")
        ));

        // Terminal: nothing else moves it.
        assert_eq!(
            duel.set_move(&"alice".into(), Weapon::Rock),
            Err(MoveError::NotAwaitingMoves)
        );
        assert!(duel.cancel(CancelReason::Withdrawn).is_none());
    }

    #[test]
    fn test_cancel_refunds_only_after_escrow() {
        let open = open_duel(100);
        let cancelled = open.cancel(CancelReason::Withdrawn).unwrap();
        assert!(cancelled.refunds.is_empty());
        assert_eq!(open.phase(), DuelPhase::Cancelled);

        let escrowing = open_duel(100);
        escrowing.accept("bob".into()).unwrap();
        assert!(escrowing.cancel(CancelReason::Stalled).is_none());

        let awaiting = awaiting_duel(100);
        let cancelled = awaiting.cancel(CancelReason::Stalled).unwrap();
        assert_eq!(cancelled.refunds.len(), 2);
    }

    #[test]
    fn test_abort_escrow() {
        let duel = open_duel(100);
        duel.accept("bob".into()).unwrap();
        let cancelled = duel.abort_escrow("bob".into()).unwrap();
        assert!(cancelled.refunds.is_empty());
        assert!(cancelled.announcement().contains("bob could not cover"));
        assert!(!duel.confirm_escrow());
    }

    #[test]
    fn test_expiry_by_phase() {
        let config = DuelConfig::default();

        let open = open_duel(100);
        let soon = open.created_at() + time::Duration::seconds(5);
        assert!(open.cancel_if_expired(soon, &config).is_none());
        let late = open.created_at() + config.open_ttl;
        let cancelled = open.cancel_if_expired(late, &config).unwrap();
        assert_eq!(cancelled.reason, CancelReason::Unanswered);

        let awaiting = awaiting_duel(100);
        let late = OffsetDateTime::now_utc() + config.awaiting_moves_ttl;
        let cancelled = awaiting.cancel_if_expired(late, &config).unwrap();
        assert_eq!(cancelled.reason, CancelReason::Stalled);
        assert_eq!(cancelled.refunds.len(), 2);
    }

    #[test]
    fn test_summary_hides_weapons() {
        let duel = awaiting_duel(100);
        duel.set_move(&"bob".into(), Weapon::Paper).unwrap();
        let summary = duel.summary();
        assert_eq!(summary.status, DuelStatus::AwaitingMoves);
        assert_eq!(summary.opponent.as_deref(), Some("bob"));
        assert!(!summary.initiator_ready);
        assert!(summary.opponent_ready);
    }
}
