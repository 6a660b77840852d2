//! # VENTURE Combat System
//!
//! Turn-based battles between one player and one creature.
//!
//! ## Design Principles
//!
//! 1. **Validate, then mutate** - a rejected action leaves the session untouched
//! 2. **Owned randomness** - each session carries its own seeded `ChaCha8Rng`
//! 3. **Descriptors, not writes** - outcomes are returned for the caller to persist
//! 4. **One writer per player** - the registry serializes work per player key
//!
//! ## Example
//!
//! ```rust,ignore
//! use venture_combat::{CombatAction, CombatEngine, SessionRegistry};
//!
//! let session = engine.initialize_session(&profile, zone_id, creature_id, None)?;
//! registry.open(session)?;
//! let entry = registry.with_session(player_id, |s| engine.resolve_action(s, CombatAction::Attack))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod action;
pub mod combatant;
pub mod engine;
pub mod error;
pub mod log;
pub mod outcome;
pub mod registry;
pub mod resources;
pub mod session;
pub mod status;
pub mod tuning;

pub use action::CombatAction;
pub use combatant::{
    scale_creature, CombatStats, Combatant, CreatureStats, Loadout, PlayerProfile,
    MAX_LOADOUT_SLOTS,
};
pub use engine::{compute_damage, CombatEngine};
pub use error::{CombatError, CombatResult};
pub use log::{PhaseOutcome, RoundLog, StatusApplied};
pub use outcome::{BattleOutcome, IdleOutcome, RewardResult};
pub use registry::{SessionPolicy, SessionRegistry};
pub use resources::{CooldownKey, CooldownTable, ResourcePools, RESOURCE_CAP};
pub use session::{CombatSession, Encounter, SessionState, Victor};
pub use status::{DotStack, DotTick, StatusEffects};
pub use tuning::CombatTuning;
