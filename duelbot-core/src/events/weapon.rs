//! Rock-paper-scissors weapons and the beats-relation between them.

use std::str::FromStr;

/// A duel weapon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Weapon {
    Rock,
    Paper,
    Scissors,
}

impl Weapon {
    pub const ALL: [Weapon; 3] = [Weapon::Rock, Weapon::Paper, Weapon::Scissors];

    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock.
    pub fn beats(self, other: Weapon) -> bool {
        matches!(
            (self, other),
            (Weapon::Rock, Weapon::Scissors)
                | (Weapon::Scissors, Weapon::Paper)
                | (Weapon::Paper, Weapon::Rock)
        )
    }

    /// Compare two weapons from the first one's point of view.
    pub fn against(self, other: Weapon) -> Clash {
        if self == other {
            Clash::Tie
        } else if self.beats(other) {
            Clash::Win
        } else {
            Clash::Loss
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Weapon::Rock => "rock",
            Weapon::Paper => "paper",
            Weapon::Scissors => "scissors",
        }
    }
}

impl std::fmt::Display for Weapon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown weapon: {0}")]
pub struct UnknownWeapon(String);

impl FromStr for Weapon {
    type Err = UnknownWeapon;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rock" => Ok(Weapon::Rock),
            "paper" => Ok(Weapon::Paper),
            "scissors" => Ok(Weapon::Scissors),
            _ => Err(UnknownWeapon(s.to_string())),
        }
    }
}

/// Result of one weapon meeting another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clash {
    Win,
    Loss,
    Tie,
}
