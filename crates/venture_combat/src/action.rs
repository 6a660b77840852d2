//! Player actions and their string identifiers.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use venture_economy::AbilityId;

use crate::error::CombatError;

/// What the player does in a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum CombatAction {
    /// Basic attack, multiplier 1.0, no cost.
    Attack,
    /// Halves the next creature hit. Has its own cooldown.
    Defend,
    /// An equipped ability.
    Ability(AbilityId),
    /// The ultimate slot. Needs a full gauge.
    Ultimate,
}

impl fmt::Display for CombatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attack => write!(f, "attack"),
            Self::Defend => write!(f, "defend"),
            Self::Ability(id) => write!(f, "ability:{id}"),
            Self::Ultimate => write!(f, "ultimate"),
        }
    }
}

impl FromStr for CombatAction {
    type Err = CombatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "attack" => Ok(Self::Attack),
            "defend" => Ok(Self::Defend),
            "ultimate" => Ok(Self::Ultimate),
            other => other
                .strip_prefix("ability:")
                .and_then(|id| id.parse().ok())
                .map(Self::Ability)
                .ok_or_else(|| CombatError::InvalidAction(format!("unknown action '{other}'"))),
        }
    }
}
