//! # Error Taxonomy
//!
//! One error type for callers, mapped onto the five recoverable kinds plus
//! `Internal` for configuration and storage faults.

use thiserror::Error;
use venture_combat::CombatError;
use venture_economy::EconomyError;

/// What a presentation layer needs to know about a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A player, creature, recipe, item or zone does not exist.
    EntityNotFound,
    /// Not enough coins, level or ingredients.
    InsufficientResources,
    /// The player has no battle to act on.
    NoActiveSession,
    /// The action is unknown or illegal right now.
    InvalidAction,
    /// The request conflicts with current state.
    StateConflict,
    /// Configuration or storage fault.
    Internal,
}

/// Errors surfaced by the facade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VentureError {
    /// Catalog, store or crafting failure.
    #[error(transparent)]
    Economy(#[from] EconomyError),

    /// Session failure.
    #[error(transparent)]
    Combat(#[from] CombatError),

    /// Bad or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl VentureError {
    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Economy(err) => economy_kind(err),
            Self::Combat(err) => match err {
                CombatError::NoActiveSession(_) => ErrorKind::NoActiveSession,
                CombatError::InvalidAction(_) => ErrorKind::InvalidAction,
                CombatError::StateConflict(_) => ErrorKind::StateConflict,
                CombatError::Economy(inner) => economy_kind(inner),
            },
            Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// True for caller mistakes that leave all state untouched.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

fn economy_kind(err: &EconomyError) -> ErrorKind {
    match err {
        EconomyError::EntityNotFound { .. } => ErrorKind::EntityNotFound,
        EconomyError::InsufficientResources { .. } => ErrorKind::InsufficientResources,
        EconomyError::CycleDetected(_)
        | EconomyError::ArithmeticOverflow
        | EconomyError::InvalidConfig(_)
        | EconomyError::Ledger(_) => ErrorKind::Internal,
    }
}

/// Result type for facade operations.
pub type VentureResult<T> = Result<T, VentureError>;
