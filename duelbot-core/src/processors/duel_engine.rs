//! DuelEngine processor.
//!
//! The DuelEngine is responsible for:
//! - Opening duels through the `EventRegistry`
//! - Matching `!accept` to an open duel and collecting both wagers into escrow
//! - Recording whispered weapons and settling the duel exactly once
//! - Cancelling duels (withdrawn, aborted, expired) and refunding escrow
//! - Announcing every outcome through the `ChatGateway`
//!
//! State transitions happen inside `DuelEvent`'s lock. Everything that talks
//! to the ledger or to chat runs here afterwards, once the transition has
//! committed, so a slow ledger never stalls commands for other duels.

use kanau::processor::Processor;
use smallvec::SmallVec;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigStore, DuelConfig};
use crate::events::{
    CancelReason, Cancellation, DuelEvent, DuelOutcome, DuelPhase, EscrowTicket, Event,
    EventRegistry, MoveError, MoveOutcome, Rejection, Resolution, UserRef, Weapon,
};
use crate::gateways::{ChatGateway, LedgerOp, SettlementError, SettlementGateway};

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum DuelError {
    /// Validation failed; the message has already been sent to chat.
    #[error("{0}")]
    Rejected(#[from] Rejection),

    /// The ledger could not be read.
    #[error("ledger error: {0}")]
    Settlement(#[from] SettlementError),
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// `!duel [target] <wager>`
#[derive(Debug, Clone)]
pub struct StartDuel {
    pub channel: String,
    pub initiator: UserRef,
    pub target: Option<UserRef>,
    pub wager: i64,
}

/// `!accept`
#[derive(Debug, Clone)]
pub struct AcceptDuel {
    pub channel: String,
    pub user: UserRef,
}

/// `!rock`, `!paper`, `!scissors`
#[derive(Debug, Clone)]
pub struct ChooseWeapon {
    pub user: UserRef,
    pub weapon: Weapon,
    /// Whether the command arrived as a private whisper.
    pub whispered: bool,
}

/// `!cancelduel`: the caller withdraws their own open duels.
#[derive(Debug, Clone)]
pub struct WithdrawDuels {
    pub user: UserRef,
}

/// `!abortduel <user>`: a moderator stops every live duel involving `user`.
#[derive(Debug, Clone)]
pub struct AbortDuels {
    pub moderator: UserRef,
    pub user: UserRef,
}

/// Cancel every duel that has outlived its TTL at `now`.
#[derive(Debug, Clone)]
pub struct ExpireDuels {
    pub now: OffsetDateTime,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum AcceptOutcome {
    /// No open duel the caller could take.
    NoMatch,
    /// Another `!accept` closed the duel first.
    LostRace,
    /// Both wagers are held; the duelists have been asked for weapons.
    Escrowed(Arc<DuelEvent>),
    /// A debit failed; the duel was cancelled and any taken wager refunded.
    EscrowFailed(Cancellation),
}

#[derive(Debug, PartialEq, Eq)]
pub enum WeaponOutcome {
    /// Sent in a public channel; not looked at.
    IgnoredPublic,
    /// The caller has no duel waiting on their weapon.
    NoMatch,
    AlreadyChosen,
    Recorded,
    Resolved(Resolution),
}

// ---------------------------------------------------------------------------
// DuelEngine
// ---------------------------------------------------------------------------

/// Drives duels from chat commands to settlement.
pub struct DuelEngine {
    registry: EventRegistry,
    ledger: Arc<dyn SettlementGateway>,
    chat: Arc<dyn ChatGateway>,
    config: ConfigStore<DuelConfig>,
}

impl DuelEngine {
    /// Create a new DuelEngine.
    ///
    /// # Arguments
    ///
    /// * `registry` - Registry holding every live event
    /// * `ledger` - Points ledger used for escrow and settlement
    /// * `chat` - Outbound chat for announcements and whispers
    /// * `config` - Duel limits and timeouts, reloadable at runtime
    pub fn new(
        registry: EventRegistry,
        ledger: Arc<dyn SettlementGateway>,
        chat: Arc<dyn ChatGateway>,
        config: ConfigStore<DuelConfig>,
    ) -> Self {
        Self {
            registry,
            ledger,
            chat,
            config,
        }
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ConfigStore<DuelConfig> {
        &self.config
    }

    // -- Chat ---------------------------------------------------------------

    pub(crate) async fn say(&self, channel: &str, text: &str) {
        if let Err(e) = self.chat.send_message(channel, text).await {
            error!(channel, error = %e, "Failed to send chat message");
        }
    }

    pub(crate) async fn whisper(&self, user: &UserRef, text: &str) {
        if let Err(e) = self.chat.send_whisper(user, text).await {
            error!(user = %user, error = %e, "Failed to send whisper");
        }
    }

    // -- Ledger -------------------------------------------------------------

    /// Issue credits and report the ones that failed.
    ///
    /// Failures are logged one by one and not retried; the duel still reaches
    /// its terminal state.
    async fn credit_all(&self, ops: &[LedgerOp]) -> SmallVec<[LedgerOp; 2]> {
        let mut failed = SmallVec::new();
        for op in ops {
            if let Err(e) = self.ledger.credit(op).await {
                error!(
                    event_id = %op.event_id,
                    user = %op.user,
                    kind = %op.kind,
                    amount = op.amount,
                    error = %e,
                    "Settlement credit failed"
                );
                failed.push(op.clone());
            }
        }
        failed
    }

    /// Debit both wagers for an accepted duel.
    async fn collect_escrow(&self, duel: Arc<DuelEvent>, ticket: EscrowTicket) -> AcceptOutcome {
        let mut taken: SmallVec<[LedgerOp; 2]> = SmallVec::new();
        for user in [&ticket.initiator, &ticket.opponent] {
            let op = LedgerOp::escrow(ticket.duel_id, user.clone(), ticket.wager);
            match self.ledger.debit(&op).await {
                Ok(()) => taken.push(op),
                Err(e) => {
                    warn!(
                        duel_id = %ticket.duel_id,
                        user = %user,
                        wager = ticket.wager,
                        error = %e,
                        "Escrow debit failed, cancelling duel"
                    );
                    let refunds: SmallVec<[LedgerOp; 2]> = taken
                        .iter()
                        .map(|t| LedgerOp::refund(t.event_id, t.user.clone(), t.amount))
                        .collect();
                    self.credit_all(&refunds).await;

                    let Some(cancellation) = duel.abort_escrow(user.clone()) else {
                        // Only this task moves a duel out of Escrowing.
                        return AcceptOutcome::LostRace;
                    };
                    self.registry.remove_event(ticket.duel_id).await;
                    self.say(&cancellation.channel, &cancellation.announcement())
                        .await;
                    return AcceptOutcome::EscrowFailed(cancellation);
                }
            }
        }

        duel.confirm_escrow();
        info!(
            duel_id = %ticket.duel_id,
            initiator = %ticket.initiator,
            opponent = %ticket.opponent,
            wager = ticket.wager,
            "Duel accepted, wagers in escrow"
        );

        self.say(
            &ticket.channel,
            &format!(
                "{} accepted {}'s duel for {} points! Whisper me !rock, !paper or !scissors.",
                ticket.opponent, ticket.initiator, ticket.wager
            ),
        )
        .await;
        for (me, them) in [
            (&ticket.initiator, &ticket.opponent),
            (&ticket.opponent, &ticket.initiator),
        ] {
            self.whisper(
                me,
                &format!(
                    "Your duel against {them} is on. Reply with !rock, !paper or !scissors."
                ),
            )
            .await;
        }

        AcceptOutcome::Escrowed(duel)
    }

    /// Pay out a resolved duel, retire it, and announce the result.
    async fn settle(&self, resolution: &Resolution) {
        let failed = self.credit_all(&resolution.settlement_plan()).await;
        self.registry.remove_event(resolution.duel_id).await;

        match &resolution.outcome {
            DuelOutcome::Draw { first, second } => info!(
                duel_id = %resolution.duel_id,
                first = %first.user,
                second = %second.user,
                weapon = %first.weapon,
                wager = resolution.wager,
                failed_credits = failed.len(),
                "Duel ended in a draw"
            ),
            DuelOutcome::Victory { winner, loser } => info!(
                duel_id = %resolution.duel_id,
                winner = %winner.user,
                loser = %loser.user,
                winner_weapon = %winner.weapon,
                loser_weapon = %loser.weapon,
                pot = resolution.pot(),
                failed_credits = failed.len(),
                "Duel won"
            ),
        }

        self.say(&resolution.channel, &resolution.announcement())
            .await;
    }

    /// Refund a cancelled duel's escrow, retire it, and announce it.
    async fn unwind(&self, cancellation: &Cancellation) {
        let refunds: SmallVec<[LedgerOp; 2]> = cancellation
            .refunds
            .iter()
            .map(|user| LedgerOp::refund(cancellation.duel_id, user.clone(), cancellation.wager))
            .collect();
        let failed = self.credit_all(&refunds).await;
        self.registry.remove_event(cancellation.duel_id).await;

        info!(
            duel_id = %cancellation.duel_id,
            reason = ?cancellation.reason,
            refunded = refunds.len() - failed.len(),
            failed_refunds = failed.len(),
            "Duel cancelled"
        );
        self.say(&cancellation.channel, &cancellation.announcement())
            .await;
    }

    async fn cancel_each(
        &self,
        duels: impl IntoIterator<Item = Arc<DuelEvent>>,
        mut cancel: impl FnMut(&DuelEvent) -> Option<Cancellation>,
    ) -> Vec<Cancellation> {
        let mut cancelled = Vec::new();
        for duel in duels {
            if let Some(cancellation) = cancel(&duel) {
                self.unwind(&cancellation).await;
                cancelled.push(cancellation);
            }
        }
        cancelled
    }
}

// ---------------------------------------------------------------------------
// Processor trait implementations
// ---------------------------------------------------------------------------

impl Processor<StartDuel> for DuelEngine {
    type Output = Arc<DuelEvent>;
    type Error = DuelError;

    #[tracing::instrument(skip_all, name = "duel:start", fields(initiator = %cmd.initiator))]
    async fn process(&self, cmd: StartDuel) -> Result<Arc<DuelEvent>, DuelError> {
        let balance = self.ledger.balance(&cmd.initiator).await?;
        let max_wager = self.config.snapshot().await.max_wager;
        let duel = DuelEvent::new(
            cmd.channel.as_str(),
            cmd.initiator,
            cmd.target,
            cmd.wager,
            balance,
        )
        .with_max_wager(max_wager);

        match self.registry.start_event(duel).await {
            Ok(duel) => {
                let text = match duel.target() {
                    Some(target) => format!(
                        "{} challenges {} to a duel for {} points! {}, type !accept to fight.",
                        duel.initiator(),
                        target,
                        duel.wager(),
                        target
                    ),
                    None => format!(
                        "{} wants to duel anyone for {} points! Type !accept to fight.",
                        duel.initiator(),
                        duel.wager()
                    ),
                };
                self.say(&cmd.channel, &text).await;
                Ok(duel)
            }
            Err(rejection) => {
                self.say(&cmd.channel, &rejection.to_string()).await;
                Err(rejection.into())
            }
        }
    }
}

impl Processor<AcceptDuel> for DuelEngine {
    type Output = AcceptOutcome;
    type Error = DuelError;

    #[tracing::instrument(skip_all, name = "duel:accept", fields(user = %cmd.user))]
    async fn process(&self, cmd: AcceptDuel) -> Result<AcceptOutcome, DuelError> {
        let open: Vec<Arc<DuelEvent>> = self
            .registry
            .get_events::<DuelEvent>()
            .await
            .into_iter()
            .filter(|duel| duel.is_open())
            .collect();

        // A duel aimed at the caller wins over any undirected one.
        let candidates: Vec<&Arc<DuelEvent>> = open
            .iter()
            .filter(|duel| duel.is_directed_at(&cmd.user))
            .chain(
                open.iter()
                    .filter(|duel| duel.target().is_none() && duel.initiator() != &cmd.user),
            )
            .collect();

        let Some(first) = candidates.first() else {
            debug!("No open duel to accept");
            return Ok(AcceptOutcome::NoMatch);
        };

        // Take the first duel the caller can cover; if none, report on the first.
        let balance = self.ledger.balance(&cmd.user).await?;
        let duel = match candidates
            .iter()
            .find(|duel| duel.can_accept(&cmd.user, balance).is_ok())
        {
            Some(duel) => Arc::clone(duel),
            None => {
                let rejection = first
                    .can_accept(&cmd.user, balance)
                    .err()
                    .unwrap_or(Rejection::NotOpen {
                        user: cmd.user.clone(),
                    });
                self.say(&cmd.channel, &rejection.to_string()).await;
                return Err(rejection.into());
            }
        };

        let Some(ticket) = duel.accept(cmd.user) else {
            debug!(duel_id = %duel.id(), "Duel was accepted by someone else first");
            return Ok(AcceptOutcome::LostRace);
        };

        Ok(self.collect_escrow(duel, ticket).await)
    }
}

impl Processor<ChooseWeapon> for DuelEngine {
    type Output = WeaponOutcome;
    type Error = Infallible;

    #[tracing::instrument(skip_all, name = "duel:weapon", fields(user = %cmd.user))]
    async fn process(&self, cmd: ChooseWeapon) -> Result<WeaponOutcome, Infallible> {
        if !cmd.whispered {
            debug!("Weapon sent in public chat, ignoring");
            return Ok(WeaponOutcome::IgnoredPublic);
        }

        let duels = self.registry.get_events::<DuelEvent>().await;
        let mut awaiting = duels
            .iter()
            .filter(|duel| duel.phase() == DuelPhase::AwaitingMoves)
            .filter_map(|duel| duel.get_participant(&cmd.user).map(|p| (duel, p)));

        // With several duels running, the oldest one still missing this
        // user's weapon gets it.
        let mut already_chosen = false;
        let target = awaiting.find(|(_, participant)| {
            already_chosen |= participant.has_moved();
            !participant.has_moved()
        });

        let Some((duel, _)) = target else {
            if already_chosen {
                self.whisper(&cmd.user, "You already picked your weapon.")
                    .await;
                return Ok(WeaponOutcome::AlreadyChosen);
            }
            debug!("No duel waiting on this user's weapon");
            return Ok(WeaponOutcome::NoMatch);
        };

        match duel.set_move(&cmd.user, cmd.weapon) {
            Ok(MoveOutcome::Recorded { waiting_on }) => {
                info!(duel_id = %duel.id(), "Weapon recorded");
                self.whisper(
                    &cmd.user,
                    &format!("You picked {}. Waiting on {}.", cmd.weapon, waiting_on),
                )
                .await;
                Ok(WeaponOutcome::Recorded)
            }
            Ok(MoveOutcome::Resolved(resolution)) => {
                self.settle(&resolution).await;
                Ok(WeaponOutcome::Resolved(resolution))
            }
            Err(MoveError::AlreadyChosen) => {
                self.whisper(&cmd.user, "You already picked your weapon.")
                    .await;
                Ok(WeaponOutcome::AlreadyChosen)
            }
            Err(e) => {
                // Resolved or cancelled between the snapshot and the lock.
                debug!(duel_id = %duel.id(), error = %e, "Weapon not recorded");
                Ok(WeaponOutcome::NoMatch)
            }
        }
    }
}

impl Processor<WithdrawDuels> for DuelEngine {
    type Output = Vec<Cancellation>;
    type Error = Infallible;

    #[tracing::instrument(skip_all, name = "duel:withdraw", fields(user = %cmd.user))]
    async fn process(&self, cmd: WithdrawDuels) -> Result<Vec<Cancellation>, Infallible> {
        let own = self
            .registry
            .get_events::<DuelEvent>()
            .await
            .into_iter()
            .filter(|duel| duel.initiator() == &cmd.user && duel.is_open());
        Ok(self
            .cancel_each(own, |duel| duel.cancel(CancelReason::Withdrawn))
            .await)
    }
}

impl Processor<AbortDuels> for DuelEngine {
    type Output = Vec<Cancellation>;
    type Error = Infallible;

    #[tracing::instrument(skip_all, name = "duel:abort", fields(moderator = %cmd.moderator, user = %cmd.user))]
    async fn process(&self, cmd: AbortDuels) -> Result<Vec<Cancellation>, Infallible> {
        let involved = self
            .registry
            .get_events::<DuelEvent>()
            .await
            .into_iter()
            .filter(|duel| duel.involves(&cmd.user));
        let by = cmd.moderator;
        Ok(self
            .cancel_each(involved, |duel| {
                duel.cancel(CancelReason::Aborted { by: by.clone() })
            })
            .await)
    }
}

impl Processor<ExpireDuels> for DuelEngine {
    type Output = Vec<Cancellation>;
    type Error = Infallible;

    async fn process(&self, cmd: ExpireDuels) -> Result<Vec<Cancellation>, Infallible> {
        let config = self.config.snapshot().await;
        let duels = self.registry.get_events::<DuelEvent>().await;
        Ok(self
            .cancel_each(duels, |duel| duel.cancel_if_expired(cmd.now, &config))
            .await)
    }
}
