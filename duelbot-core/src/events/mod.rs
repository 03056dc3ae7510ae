//! The event engine: timed, multi-party chat games.
//!
//! # Pieces
//!
//! - [`Participant`] binds a [`UserRef`] to a role and an optional weapon.
//! - [`Event`] is the lifecycle contract the registry works with.
//! - [`DuelEvent`] is the wagered rock-paper-scissors state machine.
//! - [`EventRegistry`] owns every live event and arbitrates registration
//!   and removal.
//!
//! Events are ephemeral: nothing here survives a restart.

pub mod duel;
pub mod event;
pub mod participant;
pub mod registry;
pub mod resolution;
pub mod weapon;

pub use duel::{
    CancelReason, Cancellation, DuelEvent, DuelPhase, EscrowTicket, MoveError, MoveOutcome,
};
pub use event::{Event, Rejection};
pub use participant::{Participant, Participants, Role, UserRef};
pub use registry::EventRegistry;
pub use resolution::{DuelOutcome, Hand, Resolution};
pub use weapon::{Clash, Weapon};
