//! # Economy Error Types
//!
//! All errors that can occur in the economy system.

use std::fmt;

use thiserror::Error;

use crate::catalog::ItemId;

/// The kind of catalog or store entity a lookup failed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A player record.
    Player,
    /// A zone definition.
    Zone,
    /// An item definition.
    Item,
    /// A creature template.
    Creature,
    /// An ability definition.
    Ability,
    /// A character class.
    Class,
    /// A crafting recipe.
    Recipe,
    /// A rarity tier row.
    RarityTier,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Player => "player",
            Self::Zone => "zone",
            Self::Item => "item",
            Self::Creature => "creature",
            Self::Ability => "ability",
            Self::Class => "class",
            Self::Recipe => "recipe",
            Self::RarityTier => "rarity tier",
        };
        f.write_str(name)
    }
}

/// A resource a player can run short of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Coin balance.
    Currency,
    /// Player level.
    Level,
    /// Units of an inventory item.
    Item(ItemId),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Currency => f.write_str("currency"),
            Self::Level => f.write_str("level"),
            Self::Item(id) => write!(f, "item {id}"),
        }
    }
}

/// Errors that can occur in the economy system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// A referenced player, zone, item or recipe does not exist.
    #[error("{kind} not found: {id}")]
    EntityNotFound {
        /// What was looked up.
        kind: EntityKind,
        /// The missing identifier.
        id: u64,
    },

    /// The player cannot cover a cost or requirement.
    #[error("insufficient {resource}: need {required}, have {available}")]
    InsufficientResources {
        /// The resource that fell short.
        resource: Resource,
        /// The amount required.
        required: u64,
        /// The amount available.
        available: u64,
    },

    /// Detected a cycle in the recipe graph (infinite resource generation).
    #[error("cycle detected in recipe graph at recipe {0}")]
    CycleDetected(u32),

    /// Arithmetic overflow in a balance or quantity update.
    #[error("arithmetic overflow in economic calculation")]
    ArithmeticOverflow,

    /// Invalid catalog or configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The ledger could not be read or written.
    #[error("ledger failure: {0}")]
    Ledger(String),
}

impl EconomyError {
    /// Shorthand for an [`EconomyError::EntityNotFound`].
    #[must_use]
    pub fn not_found(kind: EntityKind, id: impl Into<u64>) -> Self {
        Self::EntityNotFound { kind, id: id.into() }
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
