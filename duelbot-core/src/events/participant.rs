//! Participants and the user identity they are bound to.

use compact_str::CompactString;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};

use super::weapon::Weapon;

/// A chat user, compared case-insensitively by login name.
///
/// The original spelling is kept for display; equality and hashing use the
/// lowercased login so `Alice` and `alice` are the same user.
#[derive(Debug, Clone)]
pub struct UserRef {
    display: CompactString,
    login: CompactString,
}

impl UserRef {
    pub fn new(name: impl Into<CompactString>) -> Self {
        let display: CompactString = name.into();
        let display: CompactString = display.trim().trim_start_matches('@').into();
        let login = CompactString::from(display.to_lowercase());
        Self { display, login }
    }

    /// Lowercased login, the key used by the ledger.
    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn display_name(&self) -> &str {
        &self.display
    }
}

impl PartialEq for UserRef {
    fn eq(&self, other: &Self) -> bool {
        self.login == other.login
    }
}

impl Eq for UserRef {}

impl Hash for UserRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.login.hash(state);
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<CompactString> for UserRef {
    fn from(value: CompactString) -> Self {
        Self::new(value)
    }
}

impl From<&str> for UserRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<UserRef> for CompactString {
    fn from(value: UserRef) -> Self {
        value.display
    }
}

/// Point-in-time copy of an event's participants.
pub type Participants = SmallVec<[Participant; 2]>;

/// Which side of an event a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Target,
}

/// A user bound to an event, with the move they have submitted so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user: UserRef,
    pub role: Role,
    pub weapon: Option<Weapon>,
}

impl Participant {
    pub fn new(user: UserRef, role: Role) -> Self {
        Self {
            user,
            role,
            weapon: None,
        }
    }

    pub fn has_moved(&self) -> bool {
        self.weapon.is_some()
    }
}
