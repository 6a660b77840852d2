//! # Combat Error Types

use thiserror::Error;
use venture_economy::{EconomyError, PlayerId};

/// Errors that can occur while running a combat session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CombatError {
    /// The player has no session to act on.
    #[error("player {0} has no active combat session")]
    NoActiveSession(PlayerId),

    /// The action is unknown, unaffordable or on cooldown.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// The request conflicts with the session's current state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Catalog or store failure.
    #[error(transparent)]
    Economy(#[from] EconomyError),
}

/// Result type for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;
